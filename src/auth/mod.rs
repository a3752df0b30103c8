pub mod gate;
pub mod signature;

pub use gate::{AuthError, AuthenticationGate, GateConfig, VerifiedIdentity};
pub use signature::{InvalidSignature, ParameterMap, SignatureVerifier};
