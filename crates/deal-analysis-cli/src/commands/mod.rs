pub mod promote;
pub mod sensitivity;
pub mod structures;
