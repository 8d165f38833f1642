pub type Byte = u8;
pub type Word = u16;
pub type Long = u32;

/// 32-bit CPU address
pub type Address = u32;
