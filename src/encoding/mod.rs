pub mod one_hot;
pub mod sparse;

pub use one_hot::OneHotEncoder;
pub use sparse::{SparseMatrix, SparseRow};
