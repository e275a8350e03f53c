/// How an error should be handled by the outer processing loop.
///
/// Mirrors the taxonomy the core distinguishes: transient failures are
/// retried at the block level, fatal ones stop the process so an operator
/// can intervene, and unknown-method outcomes are not errors at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// RPC or store hiccup; the outer loop sleeps and retries the same block.
    Transient,
    /// ABI drift or an invariant violation; the process must exit.
    Fatal,
}

/// Implemented by every error type the block-processing pipeline can raise
/// so the listener loop can decide whether to retry or abort without
/// matching on concrete variants from every component.
pub trait Classify {
    fn severity(&self) -> Severity;
}
