pub mod num;

pub use num::sign_extend;
