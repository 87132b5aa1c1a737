//! Reporting of per-file faults.

use std::io::Write;

use treesum_core::WalkFault;

/// Receives faults the walker recovered from.
///
/// Faults are reported synchronously, before the walk moves on to the next
/// entry. Implemented for any `FnMut(&WalkFault)` closure.
pub trait FaultSink {
    /// Report a single fault.
    fn report(&mut self, fault: &WalkFault);
}

impl<F> FaultSink for F
where
    F: FnMut(&WalkFault),
{
    fn report(&mut self, fault: &WalkFault) {
        self(fault)
    }
}

/// Reports faults as `tracing` warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl FaultSink for LogSink {
    fn report(&mut self, fault: &WalkFault) {
        tracing::warn!(path = %fault.path().display(), error = %fault, "failed to process entry");
    }
}

/// Writes one line per fault to a writer.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    /// Create a sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consume the sink, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_fault(&mut self, fault: &WalkFault) -> std::io::Result<()> {
        match fault {
            WalkFault::Digest(err) => writeln!(
                self.writer,
                "Error processing file {}: {}",
                err.path.display(),
                err.source
            )?,
            WalkFault::Traversal { path, message } => {
                writeln!(self.writer, "Error traversing {}: {message}", path.display())?
            }
        }
        self.writer.flush()
    }
}

impl<W: Write> FaultSink for WriterSink<W> {
    fn report(&mut self, fault: &WalkFault) {
        // A broken error log must not stop the walk.
        if let Err(err) = self.write_fault(fault) {
            tracing::error!(error = %err, fault = %fault, "failed to write fault");
        }
    }
}
