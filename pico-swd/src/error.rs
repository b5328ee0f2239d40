/// The kind of failure reported by any debug link operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, docsplay::Display)]
pub enum ErrorKind {
    /// Timed out waiting for the target.
    Timeout,
    /// The target answered with a FAULT acknowledge.
    Fault,
    /// An unexpected acknowledge or framing error occurred on the wire.
    Protocol,
    /// The data parity bit did not match the received data.
    Parity,
    /// The target answered with a WAIT acknowledge.
    Wait,
    /// The debug session is not connected.
    NotConnected,
    /// The core is not halted.
    NotHalted,
    /// The core is already halted.
    AlreadyHalted,
    /// The operation is not valid in the current state.
    InvalidState,
    /// The link configuration is invalid.
    InvalidConfig,
    /// The debug module is busy.
    ResourceBusy,
    /// An invalid parameter was supplied.
    InvalidParam,
    /// The debug module has not been initialized.
    NotInitialized,
    /// An abstract debug module command failed.
    AbstractCommandFailed,
    /// The host pin interface failed.
    Bus,
    /// The address is not aligned to the access size.
    Alignment,
    /// Read back data did not match what was written.
    VerifyFailed,
}

/// An error returned by the debug link.
///
/// Carries the [`ErrorKind`] callers match on, plus an optional short
/// diagnostic string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
}

impl Error {
    /// Create an error of the given kind without any context.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Attach a diagnostic string, replacing any previous one.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The diagnostic string, if any.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.kind, context),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_includes_context() {
        let error = Error::new(ErrorKind::Timeout).with_context("waiting for S_HALT");

        assert_eq!(
            error.to_string(),
            format!("{} (waiting for S_HALT)", ErrorKind::Timeout)
        );
        assert_eq!(error.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn display_without_context() {
        let error: Error = ErrorKind::NotConnected.into();

        assert_eq!(error.to_string(), ErrorKind::NotConnected.to_string());
        assert_eq!(error.context(), None);
    }
}
