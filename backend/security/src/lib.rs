pub mod access;
pub mod moderation;
pub mod token;

pub use access::AccessPolicy;
pub use moderation::{
    ContentPolicy, ForbiddenWords, InjectionGuard, ModerationFilter, RejectCategory, Verdict,
};
pub use token::{GatewayClaims, RequestSigner, TokenIssuer};
