//! Encodes [`Response`]s back onto the wire, in either the binary
//! server->client/worker framing or the line-based admin framing,
//! mirroring which framing that connection's decoder settled into.

use std::{error, fmt, io};

use bytes::{BufMut, BytesMut};
use tokio_util::codec;

use super::protocol::{Opcode, Response};

const BINARY_MAGIC: &[u8; 4] = b"\0RES";

#[derive(Debug, Default)]
pub struct Encoder {}

impl codec::Encoder<Response> for Encoder {
    type Error = Error;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Error> {
        use Response::*;

        fn frame(dst: &mut BytesMut, opcode: Opcode, args: &[&[u8]]) {
            let body_len: usize = args.iter().map(|a| a.len()).sum::<usize>()
                + args.len().saturating_sub(1);
            dst.reserve(12 + body_len);
            dst.put_slice(BINARY_MAGIC);
            dst.put_u32(opcode as u32);
            dst.put_u32(body_len as u32);
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    dst.put_u8(0);
                }
                dst.put_slice(a);
            }
        }

        match item {
            JobCreated { handle } => frame(dst, Opcode::JobCreated, &[&handle]),
            WorkData { handle, data } => frame(dst, Opcode::WorkData, &[&handle, &data]),
            WorkWarning { handle, data } => frame(dst, Opcode::WorkWarning, &[&handle, &data]),
            WorkStatus { handle, numerator, denominator } => frame(
                dst,
                Opcode::WorkStatus,
                &[&handle, numerator.to_string().as_bytes(), denominator.to_string().as_bytes()],
            ),
            WorkComplete { handle, data } => frame(dst, Opcode::WorkComplete, &[&handle, &data]),
            WorkFail { handle } => frame(dst, Opcode::WorkFail, &[&handle]),
            WorkException { handle, data } => frame(dst, Opcode::WorkException, &[&handle, &data]),
            StatusRes { handle, known, running, numerator, denominator } => frame(
                dst,
                Opcode::StatusRes,
                &[
                    &handle,
                    bool_byte(known),
                    bool_byte(running),
                    numerator.to_string().as_bytes(),
                    denominator.to_string().as_bytes(),
                ],
            ),
            OptionRes { option } => frame(dst, Opcode::OptionRes, &[&option]),
            EchoRes { data } => frame(dst, Opcode::EchoRes, &[&data]),
            Noop => frame(dst, Opcode::Noop, &[]),
            NoJob => frame(dst, Opcode::NoJob, &[]),
            JobAssign { handle, function, workload } => {
                frame(dst, Opcode::JobAssign, &[&handle, &function, &workload])
            },
            JobAssignUniq { handle, function, unique, workload } => frame(
                dst,
                Opcode::JobAssignUniq,
                &[&handle, &function, &unique, &workload],
            ),
            JobAssignAll { handle, function, unique, reducer, workload } => frame(
                dst,
                Opcode::JobAssignAll,
                &[&handle, &function, &unique, &reducer, &workload],
            ),
            Error { code, text } => frame(dst, Opcode::Error, &[&code, &text]),
            AdminLine(line) => {
                dst.reserve(line.len() + 1);
                dst.put_slice(&line);
                dst.put_u8(b'\n');
            },
            AdminTable(rows) => {
                for row in &rows {
                    dst.reserve(row.len() + 1);
                    dst.put_slice(row);
                    dst.put_u8(b'\n');
                }
                dst.put_slice(b".\n");
            },
        }

        Ok(())
    }
}

fn bool_byte(b: bool) -> &'static [u8] {
    if b {
        b"1"
    } else {
        b"0"
    }
}

#[derive(Debug)]
pub enum Error {
    IO(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::IO(value)
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};
    use tokio_util::codec::Encoder as _;

    use super::*;

    fn encode(resp: Response) -> BytesMut {
        let mut buf = BytesMut::new();
        Encoder::default().encode(resp, &mut buf).unwrap();
        buf
    }

    #[test]
    fn job_assign_frame_matches_wire_layout() {
        let buf = encode(Response::JobAssign {
            handle: Bytes::from_static(b"H:host:1"),
            function: Bytes::from_static(b"reverse"),
            workload: Bytes::from_static(b"hello"),
        });

        assert_eq!(&buf[0..4], b"\0RES");
        assert_eq!(u32::from_be_bytes(buf[4..8].try_into().unwrap()), Opcode::JobAssign as u32);
        let body = &buf[12..];
        assert_eq!(body, b"H:host:1\0reverse\0hello");
    }

    #[test]
    fn work_complete_preserves_embedded_nuls_in_final_argument() {
        let payload: &[u8] = b"a\0b\0c";
        let buf = encode(Response::WorkComplete {
            handle: Bytes::from_static(b"H:host:1"),
            data: Bytes::from_static(payload),
        });
        let declared_len = u32::from_be_bytes(buf[8..12].try_into().unwrap()) as usize;
        assert_eq!(declared_len, buf.len() - 12);
        assert_eq!(&buf[12..], b"H:host:1\0a\0b\0c");
    }

    #[test]
    fn admin_table_ends_with_dot_sentinel() {
        let buf = encode(Response::AdminTable(vec![
            Bytes::from_static(b"f\t4\t1\t2"),
            Bytes::from_static(b"g\t0\t0\t0"),
        ]));
        assert_eq!(&buf[..], b"f\t4\t1\t2\ng\t0\t0\t0\n.\n");
    }

    #[test]
    fn admin_line_is_newline_terminated() {
        let buf = encode(Response::AdminLine(Bytes::from_static(b"OK")));
        assert_eq!(&buf[..], b"OK\n");
    }

    #[test]
    fn status_res_encodes_booleans_as_ascii_digits() {
        let buf = encode(Response::StatusRes {
            handle: Bytes::from_static(b"H:host:1"),
            known: true,
            running: false,
            numerator: 2,
            denominator: 5,
        });
        assert_eq!(&buf[12..], b"H:host:1\x001\x000\x002\x005");
    }
}
