pub mod bank_of_canada;
pub mod ecb;
pub mod fixer;
pub mod util;

pub use bank_of_canada::BankOfCanadaSource;
pub use ecb::EcbSource;
pub use fixer::FixerSource;
