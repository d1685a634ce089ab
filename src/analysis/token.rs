/// Token produced by analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub position: u32,     // Position within the analyzed value
    pub offset: usize,     // Byte offset in original text
}

impl Token {
    pub fn new(text: String, position: u32, offset: usize) -> Self {
        Token {
            text,
            position,
            offset,
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
