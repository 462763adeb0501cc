//! Decodes bytes from a connection into [`GearmanEvent`]s.
//!
//! The first four bytes on a connection decide its framing for the rest
//! of its life: `\0REQ` selects the binary client/worker protocol;
//! anything else selects the line-based admin protocol. The decoder
//! state is a plain enum (`Sniff`/`BinaryHeader`/`AdminLine`/...), one
//! variant per stage of that framing decision and the parse that
//! follows it.

use std::{error, fmt, io};

use bytes::{Buf, Bytes, BytesMut};
use itertools::Itertools;
use tokio_util::codec;

use super::events::GearmanEvent;
use super::protocol::{AdminCommand, Command, Opcode, Response, SubmitJob};
use crate::types::job::Priority;

const BINARY_MAGIC: &[u8; 4] = b"\0REQ";
const HEADER_LEN: usize = 12;
const ADMIN_MAX_LINE: usize = 8192;

#[derive(Debug)]
enum State {
    Sniff,
    BinaryHeader,
    BinaryBody { opcode: Opcode, len: usize },
    AdminLine,
    DiscardToNewline,
}

/// A decoder for a stream of Gearman protocol messages (binary or admin
/// text, auto-detected per connection).
#[derive(Debug)]
pub struct Decoder {
    state: State,
    max_frame_len: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(4 * 1024 * 1024)
    }
}

impl Decoder {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            state: State::Sniff,
            max_frame_len,
        }
    }
}

impl codec::Decoder for Decoder {
    type Item = GearmanEvent;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::Sniff => {
                    if src.len() < 4 {
                        return Ok(None);
                    }
                    self.state = if &src[0..4] == BINARY_MAGIC {
                        State::BinaryHeader
                    } else {
                        State::AdminLine
                    };
                },
                State::BinaryHeader => {
                    if src.len() < HEADER_LEN {
                        return Ok(None);
                    }
                    if &src[0..4] != BINARY_MAGIC {
                        return Err(Response::error("bad_magic", "expected \\0REQ").into());
                    }
                    let type_word = u32::from_be_bytes(src[4..8].try_into().unwrap());
                    let len_word = u32::from_be_bytes(src[8..12].try_into().unwrap()) as usize;

                    let opcode = Opcode::try_from(type_word)
                        .map_err(|_| Error::from(Response::error("bad_command", "unknown opcode")))?;

                    if len_word > self.max_frame_len {
                        return Err(Response::error("job_too_big", "frame exceeds max size").into());
                    }

                    src.advance(HEADER_LEN);
                    src.reserve(len_word.min(16_384));
                    self.state = State::BinaryBody { opcode, len: len_word };
                },
                State::BinaryBody { opcode, len } => {
                    if src.len() < len {
                        return Ok(None);
                    }
                    let payload = src.split_to(len).freeze();
                    self.state = State::BinaryHeader;
                    return Ok(Some(GearmanEvent::Command(parse_binary(opcode, payload)?)));
                },
                State::AdminLine => {
                    match find_newline(src, ADMIN_MAX_LINE) {
                        FindResult::Found(idx, term_len) => {
                            let mut line = src.split_to(idx);
                            src.advance(term_len);
                            if line.last() == Some(&b'\r') {
                                line.truncate(line.len() - 1);
                            }
                            return Ok(Some(GearmanEvent::Command(Command::Admin(
                                parse_admin_line(&line),
                            ))));
                        },
                        FindResult::NeedMore => return Ok(None),
                        FindResult::TooLong => {
                            self.state = State::DiscardToNewline;
                            return Err(Response::error("bad_format", "admin line too long").into());
                        },
                    }
                },
                State::DiscardToNewline => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    match find_newline(src, usize::MAX) {
                        FindResult::Found(idx, term_len) => {
                            src.advance(idx + term_len);
                            self.state = State::AdminLine;
                            return Ok(Some(GearmanEvent::Discarded));
                        },
                        _ => {
                            let keep = src.len().saturating_sub(1);
                            src.advance(keep);
                            return Ok(Some(GearmanEvent::Discarded));
                        },
                    }
                },
            }
        }
    }
}

enum FindResult {
    Found(usize, usize),
    NeedMore,
    TooLong,
}

/// Locates the next line terminator (`\n`, optionally preceded by
/// `\r`), bounding the scan to `max_line` bytes so a client that never
/// sends one can't grow the read buffer without limit.
fn find_newline(src: &BytesMut, max_line: usize) -> FindResult {
    match src.iter().find_position(|&&b| b == b'\n') {
        Some((idx, _)) => FindResult::Found(idx, 1),
        None if src.len() > max_line => FindResult::TooLong,
        None => FindResult::NeedMore,
    }
}

fn parse_admin_line(line: &[u8]) -> AdminCommand {
    let mut parts = line.split(|&b| b == b' ').filter(|p| !p.is_empty());
    let verb = parts.next().unwrap_or(b"");

    match verb {
        b"status" => AdminCommand::Status,
        b"workers" => AdminCommand::Workers,
        b"version" => AdminCommand::Version,
        b"getpid" => AdminCommand::GetPid,
        b"shutdown" => AdminCommand::Shutdown {
            graceful: parts.next() == Some(b"graceful".as_ref()),
        },
        b"maxqueue" => {
            let function = parts.next().unwrap_or(b"").to_vec().into();
            let sizes = parts
                .filter_map(|p| std::str::from_utf8(p).ok()?.parse::<u32>().ok())
                .collect();
            AdminCommand::MaxQueue { function, sizes }
        },
        _ => AdminCommand::Unknown(line.to_vec().into()),
    }
}

/// Splits `payload` into `n_fields` NUL-separated arguments, with the
/// last argument running to the end of `payload`, including
/// any embedded NULs (needed for opaque workload bytes).
fn split_args(mut payload: Bytes, n_fields: usize) -> Result<Vec<Bytes>, Error> {
    let mut out = Vec::with_capacity(n_fields);
    for _ in 0..n_fields.saturating_sub(1) {
        let pos = payload
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::from(Response::error("bad_format", "missing argument")))?;
        out.push(payload.split_to(pos));
        payload.advance(1);
    }
    out.push(payload);
    Ok(out)
}

fn parse_u32(b: &[u8]) -> Result<u32, Error> {
    std::str::from_utf8(b)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| Error::from(Response::error("bad_format", "expected a number")))
}

fn parse_u64(b: &[u8]) -> Result<u64, Error> {
    std::str::from_utf8(b)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::from(Response::error("bad_format", "expected a number")))
}

fn parse_binary(opcode: Opcode, payload: Bytes) -> Result<Command, Error> {
    use Opcode::*;

    Ok(match opcode {
        CanDo => {
            let a = split_args(payload, 1)?;
            Command::CanDo { function: a[0].clone() }
        },
        CanDoTimeout => {
            let a = split_args(payload, 2)?;
            Command::CanDoTimeout {
                function: a[0].clone(),
                timeout: parse_u32(&a[1])?,
            }
        },
        CantDo => {
            let a = split_args(payload, 1)?;
            Command::CantDo { function: a[0].clone() }
        },
        ResetAbilities => Command::ResetAbilities,
        PreSleep => Command::PreSleep,
        GrabJob => Command::GrabJob,
        GrabJobUniq => Command::GrabJobUniq,
        GrabJobAll => Command::GrabJobAll,
        AllYours => Command::AllYours,
        WorkData => {
            let a = split_args(payload, 2)?;
            Command::WorkData { handle: a[0].clone(), data: a[1].clone() }
        },
        WorkWarning => {
            let a = split_args(payload, 2)?;
            Command::WorkWarning { handle: a[0].clone(), data: a[1].clone() }
        },
        WorkStatus => {
            let a = split_args(payload, 3)?;
            Command::WorkStatus {
                handle: a[0].clone(),
                numerator: parse_u32(&a[1])?,
                denominator: parse_u32(&a[2])?,
            }
        },
        WorkComplete => {
            let a = split_args(payload, 2)?;
            Command::WorkComplete { handle: a[0].clone(), data: a[1].clone() }
        },
        WorkFail => {
            let a = split_args(payload, 1)?;
            Command::WorkFail { handle: a[0].clone() }
        },
        WorkException => {
            let a = split_args(payload, 2)?;
            Command::WorkException { handle: a[0].clone(), data: a[1].clone() }
        },
        SetClientId => {
            let a = split_args(payload, 1)?;
            Command::SetClientId { id: a[0].clone() }
        },
        SubmitJob | SubmitJobBg | SubmitJobHigh | SubmitJobHighBg | SubmitJobLow | SubmitJobLowBg => {
            let a = split_args(payload, 3)?;
            let (priority, background) = match opcode {
                SubmitJob => (Priority::Normal, false),
                SubmitJobBg => (Priority::Normal, true),
                SubmitJobHigh => (Priority::High, false),
                SubmitJobHighBg => (Priority::High, true),
                SubmitJobLow => (Priority::Low, false),
                SubmitJobLowBg => (Priority::Low, true),
                _ => unreachable!(),
            };
            Command::SubmitJob(SubmitJob {
                function: a[0].clone(),
                unique: a[1].clone(),
                priority,
                background,
                when: None,
                reducer: None,
                workload: a[2].clone(),
            })
        },
        SubmitJobEpoch => {
            let a = split_args(payload, 4)?;
            Command::SubmitJob(SubmitJob {
                function: a[0].clone(),
                unique: a[1].clone(),
                priority: Priority::Normal,
                background: true,
                when: Some(parse_u64(&a[2])?),
                reducer: None,
                workload: a[3].clone(),
            })
        },
        SubmitJobSched => {
            let a = split_args(payload, 8)?;
            let when = super::schedule::next_occurrence(&a[2], &a[3], &a[4], &a[5], &a[6])
                .ok_or_else(|| Error::from(Response::error("bad_format", "unsatisfiable schedule")))?;
            Command::SubmitJob(SubmitJob {
                function: a[0].clone(),
                unique: a[1].clone(),
                priority: Priority::Normal,
                background: true,
                when: Some(when),
                reducer: None,
                workload: a[7].clone(),
            })
        },
        SubmitReduceJob | SubmitReduceJobBackground => {
            let a = split_args(payload, 4)?;
            Command::SubmitJob(SubmitJob {
                function: a[0].clone(),
                unique: a[1].clone(),
                priority: Priority::Normal,
                background: opcode == SubmitReduceJobBackground,
                when: None,
                reducer: Some(a[2].clone()),
                workload: a[3].clone(),
            })
        },
        GetStatus => {
            let a = split_args(payload, 1)?;
            Command::GetStatus { handle: a[0].clone() }
        },
        GetStatusUnique => {
            let a = split_args(payload, 2)?;
            Command::GetStatusUnique { function: a[0].clone(), unique: a[1].clone() }
        },
        OptionReq => {
            let a = split_args(payload, 1)?;
            Command::OptionReq { option: a[0].clone() }
        },
        EchoReq => {
            let a = split_args(payload, 1)?;
            Command::EchoReq { data: a[0].clone() }
        },
        // Server -> * opcodes should never arrive on the decode side of
        // a server socket; treat them as a protocol violation.
        JobCreated | NoJob | JobAssign | StatusRes | EchoRes | Error | Noop | JobAssignUniq
        | JobAssignAll | OptionRes => {
            return Err(Response::error("bad_command", "server-direction opcode from client").into());
        },
    })
}

#[derive(Debug)]
pub enum Error {
    Client(Response),
    IO(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<Response> for Error {
    fn from(value: Response) -> Self {
        Self::Client(value)
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::IO(value)
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};
    use tokio_util::codec::Decoder as _;

    use super::*;

    fn frame(opcode: u32, args: &[&[u8]]) -> BytesMut {
        let body_len: usize =
            args.iter().map(|a| a.len()).sum::<usize>() + args.len().saturating_sub(1);
        let mut buf = BytesMut::with_capacity(12 + body_len);
        buf.put_slice(BINARY_MAGIC);
        buf.put_u32(opcode);
        buf.put_u32(body_len as u32);
        for (i, a) in args.iter().enumerate() {
            if i > 0 {
                buf.put_u8(0);
            }
            buf.put_slice(a);
        }
        buf
    }

    #[test]
    fn decodes_submit_job_high_bg() {
        let mut buf = frame(Opcode::SubmitJobHighBg as u32, &[b"f", b"u", b"payload"]);
        let mut decoder = Decoder::default();
        match decoder.decode(&mut buf).unwrap().unwrap() {
            GearmanEvent::Command(Command::SubmitJob(req)) => {
                assert_eq!(req.function, Bytes::from_static(b"f"));
                assert_eq!(req.unique, Bytes::from_static(b"u"));
                assert_eq!(req.priority, Priority::High);
                assert!(req.background);
                assert_eq!(req.workload, Bytes::from_static(b"payload"));
            },
            other => panic!("expected SubmitJob, got {other:?}"),
        }
    }

    #[test]
    fn workload_may_contain_embedded_nuls() {
        let payload: &[u8] = b"has\0a\0nul";
        let mut buf = frame(Opcode::SubmitJob as u32, &[b"f", b"", payload]);
        let mut decoder = Decoder::default();
        match decoder.decode(&mut buf).unwrap().unwrap() {
            GearmanEvent::Command(Command::SubmitJob(req)) => {
                assert_eq!(req.workload, Bytes::from_static(payload));
            },
            other => panic!("expected SubmitJob, got {other:?}"),
        }
    }

    #[test]
    fn decodes_split_across_multiple_feeds() {
        let buf = frame(Opcode::GetStatus as u32, &[b"H:host:1"]);
        let mut decoder = Decoder::default();

        let mut partial = BytesMut::from(&buf[..5]);
        assert!(decoder.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&buf[5..]);
        match decoder.decode(&mut partial).unwrap().unwrap() {
            GearmanEvent::Command(Command::GetStatus { handle }) => {
                assert_eq!(handle, Bytes::from_static(b"H:host:1"));
            },
            other => panic!("expected GetStatus, got {other:?}"),
        }
    }

    #[test]
    fn unknown_opcode_is_a_protocol_error() {
        let mut buf = frame(9999, &[]);
        let mut decoder = Decoder::default();
        assert!(matches!(decoder.decode(&mut buf), Err(Error::Client(_))));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut decoder = Decoder::new(4);
        let mut buf = frame(Opcode::SubmitJob as u32, &[b"f", b"", b"too big for four bytes"]);
        assert!(matches!(decoder.decode(&mut buf), Err(Error::Client(_))));
    }

    #[test]
    fn admin_line_is_parsed_and_crlf_trimmed() {
        let mut buf = BytesMut::from(&b"status\r\n"[..]);
        let mut decoder = Decoder::default();
        match decoder.decode(&mut buf).unwrap().unwrap() {
            GearmanEvent::Command(Command::Admin(AdminCommand::Status)) => {},
            other => panic!("expected admin Status, got {other:?}"),
        }
    }

    #[test]
    fn admin_maxqueue_parses_sizes() {
        let mut buf = BytesMut::from(&b"maxqueue f 0 10 20\n"[..]);
        let mut decoder = Decoder::default();
        match decoder.decode(&mut buf).unwrap().unwrap() {
            GearmanEvent::Command(Command::Admin(AdminCommand::MaxQueue { function, sizes })) => {
                assert_eq!(function, Bytes::from_static(b"f"));
                assert_eq!(sizes, vec![0, 10, 20]);
            },
            other => panic!("expected admin MaxQueue, got {other:?}"),
        }
    }

    #[test]
    fn admin_shutdown_graceful_flag() {
        let mut buf = BytesMut::from(&b"shutdown graceful\n"[..]);
        let mut decoder = Decoder::default();
        match decoder.decode(&mut buf).unwrap().unwrap() {
            GearmanEvent::Command(Command::Admin(AdminCommand::Shutdown { graceful })) => {
                assert!(graceful, "graceful flag must be set")
            },
            other => panic!("expected admin Shutdown, got {other:?}"),
        }
    }
}
