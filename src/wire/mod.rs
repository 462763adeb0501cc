use events::GearmanEvent;
use protocol::Response;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{self, Framed};

pub mod decoder;
pub mod encoder;
pub mod events;
pub mod protocol;
mod schedule;

pub fn framed<T: AsyncRead + AsyncWrite>(stream: T, max_frame_len: usize) -> Framed<T, Codec> {
    Framed::new(stream, Codec::new(max_frame_len))
}

pub struct Codec {
    d: decoder::Decoder,
    e: encoder::Encoder,
}

impl Codec {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            d: decoder::Decoder::new(max_frame_len),
            e: encoder::Encoder::default(),
        }
    }
}

impl codec::Decoder for Codec {
    type Item = GearmanEvent;

    type Error = decoder::Error;

    fn decode(
        &mut self,
        src: &mut bytes::BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        self.d.decode(src)
    }
}

impl codec::Encoder<Response> for Codec {
    type Error = encoder::Error;

    fn encode(
        &mut self,
        item: Response,
        dst: &mut bytes::BytesMut,
    ) -> Result<(), Self::Error> {
        self.e.encode(item, dst)
    }
}
