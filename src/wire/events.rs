use super::protocol::Command;

/// An event produced by decoding a connection's byte stream. Unlike the
/// beanstalk line protocol this crate's teacher was originally built
/// for, a Gearman binary frame carries its own declared length, so a
/// whole command (including its workload) always decodes in one shot —
/// there's no `PutChunk`/`PutEnd` split here.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GearmanEvent {
    /// A fully decoded command.
    Command(Command),
    /// Part of the input was discarded after a recoverable admin-text
    /// framing error: the connection stays open, but this event
    /// carries nothing and should simply be skipped.
    Discarded,
}
