/// Radio driver trait
pub mod traits;

pub use traits::Radio;
