use std::io::{self, Cursor, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};

/// Create a connected in-memory byte channel.
///
/// The channel is unbounded, so a builtin writing into it never blocks while
/// the consumer has not started yet. The reader sees end-of-input once every
/// writer has been dropped.
pub fn channel() -> (ChannelWriter, ChannelReader) {
    let (tx, rx) = mpsc::channel();
    (
        ChannelWriter { tx },
        ChannelReader {
            rx,
            chunk: Cursor::new(Vec::new()),
        },
    )
}

/// Writing half of [`channel`].
pub struct ChannelWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(data.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reading half of [`channel`].
pub struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    chunk: Cursor<Vec<u8>>,
}

impl Read for ChannelReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.chunk.read(out)?;
            if n > 0 || out.is_empty() {
                return Ok(n);
            }
            match self.rx.recv() {
                Ok(next) => self.chunk = Cursor::new(next),
                Err(_) => return Ok(0),
            }
        }
    }
}
