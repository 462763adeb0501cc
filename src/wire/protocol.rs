//! The command/response sum types exchanged between the dispatcher and
//! connections, and their Gearman-protocol binary opcodes.
//!
//! Modeling each command as an enum variant with its own typed payload
//! is the direct replacement for the original server's "C-style tagged
//! packet with a variadic arg list": `TryFrom<&[u8]>` on this enum
//! is the one place that knows how many args a given opcode expects.

use std::fmt;

use bytes::Bytes;

use crate::types::job::Priority;

/// Binary-protocol opcode numbers. Only the client/worker ->
/// server direction is needed for decoding; the encoder picks its own
/// opcode per [`Response`] variant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Opcode {
    CanDo = 1,
    CantDo = 2,
    ResetAbilities = 3,
    PreSleep = 4,
    Noop = 6,
    SubmitJob = 7,
    JobCreated = 8,
    GrabJob = 9,
    NoJob = 10,
    JobAssign = 11,
    WorkStatus = 12,
    WorkComplete = 13,
    WorkFail = 14,
    GetStatus = 15,
    EchoReq = 16,
    EchoRes = 17,
    SubmitJobBg = 18,
    Error = 19,
    StatusRes = 20,
    SubmitJobHigh = 21,
    SetClientId = 22,
    CanDoTimeout = 23,
    AllYours = 24,
    WorkException = 25,
    OptionReq = 26,
    OptionRes = 27,
    WorkData = 28,
    WorkWarning = 29,
    GrabJobUniq = 30,
    JobAssignUniq = 31,
    SubmitJobHighBg = 32,
    SubmitJobLow = 33,
    SubmitJobLowBg = 34,
    SubmitJobSched = 35,
    SubmitJobEpoch = 36,
    SubmitReduceJob = 37,
    SubmitReduceJobBackground = 38,
    GrabJobAll = 39,
    JobAssignAll = 40,
    GetStatusUnique = 41,
}

impl TryFrom<u32> for Opcode {
    type Error = ();

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        use Opcode::*;
        Ok(match v {
            1 => CanDo,
            2 => CantDo,
            3 => ResetAbilities,
            4 => PreSleep,
            6 => Noop,
            7 => SubmitJob,
            8 => JobCreated,
            9 => GrabJob,
            10 => NoJob,
            11 => JobAssign,
            12 => WorkStatus,
            13 => WorkComplete,
            14 => WorkFail,
            15 => GetStatus,
            16 => EchoReq,
            17 => EchoRes,
            18 => SubmitJobBg,
            19 => Error,
            20 => StatusRes,
            21 => SubmitJobHigh,
            22 => SetClientId,
            23 => CanDoTimeout,
            24 => AllYours,
            25 => WorkException,
            26 => OptionReq,
            27 => OptionRes,
            28 => WorkData,
            29 => WorkWarning,
            30 => GrabJobUniq,
            31 => JobAssignUniq,
            32 => SubmitJobHighBg,
            33 => SubmitJobLow,
            34 => SubmitJobLowBg,
            35 => SubmitJobSched,
            36 => SubmitJobEpoch,
            37 => SubmitReduceJob,
            38 => SubmitReduceJobBackground,
            39 => GrabJobAll,
            40 => JobAssignAll,
            41 => GetStatusUnique,
            _ => return Err(()),
        })
    }
}

/// A parsed `SUBMIT_JOB*`/`SUBMIT_REDUCE_JOB*` request, unified across
/// all ten wire variants (they differ only in priority, backgroundness,
/// scheduling, and the presence of a reducer name).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubmitJob {
    pub function: Bytes,
    pub unique: Bytes,
    pub priority: Priority,
    pub background: bool,
    /// `Some(epoch_secs)` for `_EPOCH`/`_SCHED` submissions; `None` means
    /// "now".
    pub when: Option<u64>,
    /// Present iff this is a `SUBMIT_REDUCE_JOB[_BACKGROUND]`.
    pub reducer: Option<Bytes>,
    pub workload: Bytes,
}

/// A command decoded from the wire, in either the binary client/worker
/// protocol or the line-based admin protocol.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    // --- Worker -> Server ---
    CanDo { function: Bytes },
    CanDoTimeout { function: Bytes, timeout: u32 },
    CantDo { function: Bytes },
    ResetAbilities,
    PreSleep,
    GrabJob,
    GrabJobUniq,
    GrabJobAll,
    WorkData { handle: Bytes, data: Bytes },
    WorkWarning { handle: Bytes, data: Bytes },
    WorkStatus { handle: Bytes, numerator: u32, denominator: u32 },
    WorkComplete { handle: Bytes, data: Bytes },
    WorkFail { handle: Bytes },
    WorkException { handle: Bytes, data: Bytes },
    SetClientId { id: Bytes },
    /// Parsed but inert.
    AllYours,

    // --- Client -> Server ---
    SubmitJob(SubmitJob),
    GetStatus { handle: Bytes },
    GetStatusUnique { function: Bytes, unique: Bytes },
    OptionReq { option: Bytes },
    EchoReq { data: Bytes },

    // --- Admin ---
    Admin(AdminCommand),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdminCommand {
    Status,
    Workers,
    MaxQueue {
        function: Bytes,
        sizes: Vec<u32>,
    },
    Shutdown {
        graceful: bool,
    },
    Version,
    GetPid,
    Unknown(Bytes),
}

/// A response emitted by the dispatcher, destined for either a client or
/// a worker connection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Response {
    // --- to Client ---
    JobCreated { handle: Bytes },
    WorkData { handle: Bytes, data: Bytes },
    WorkWarning { handle: Bytes, data: Bytes },
    WorkStatus { handle: Bytes, numerator: u32, denominator: u32 },
    WorkComplete { handle: Bytes, data: Bytes },
    WorkFail { handle: Bytes },
    WorkException { handle: Bytes, data: Bytes },
    StatusRes {
        handle: Bytes,
        known: bool,
        running: bool,
        numerator: u32,
        denominator: u32,
    },
    OptionRes { option: Bytes },
    EchoRes { data: Bytes },

    // --- to Worker ---
    Noop,
    NoJob,
    JobAssign { handle: Bytes, function: Bytes, workload: Bytes },
    JobAssignUniq {
        handle: Bytes,
        function: Bytes,
        unique: Bytes,
        workload: Bytes,
    },
    JobAssignAll {
        handle: Bytes,
        function: Bytes,
        unique: Bytes,
        reducer: Bytes,
        workload: Bytes,
    },

    // --- either direction ---
    /// `code` is a short machine token (e.g. `queue_full`), `text` is a
    /// human-readable message.
    Error { code: Bytes, text: Bytes },

    // --- Admin text ---
    /// A single `\n`-terminated line, e.g. `OK\n`.
    AdminLine(Bytes),
    /// Multiple `\n`-terminated rows followed by a `.\n` sentinel line.
    AdminTable(Vec<Bytes>),
}

impl Response {
    pub fn error(code: impl Into<Bytes>, text: impl Into<Bytes>) -> Self {
        Response::Error {
            code: code.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
