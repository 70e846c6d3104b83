pub mod import;
pub mod extraction;
pub mod derivation;
pub mod publish;
pub mod status;
pub mod processor;
