// src/hal/serial_transport.rs
//! Newline-delimited transports for the force sensor board

use std::io::{BufRead, ErrorKind};
use std::time::Duration;

use crate::error::TransportError;
use crate::hal::traits::LineTransport;

/// Line reader over any buffered byte stream.
///
/// End of stream is reported as a disconnect and a read timeout as
/// [`TransportError::Timeout`].
pub struct ReaderTransport<R> {
    reader: R,
    name: String,
    timeout: Duration,
}

impl<R: BufRead + Send> ReaderTransport<R> {
    pub fn new(reader: R, name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            reader,
            name: name.into(),
            timeout,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead + Send> LineTransport for ReaderTransport<R> {
    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<(), TransportError> {
        buf.clear();

        match self.reader.read_until(b'\n', buf) {
            Ok(0) => Err(TransportError::Disconnected(format!("{}: end of stream", self.name))),
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                Ok(())
            }
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Err(TransportError::Timeout(self.timeout))
            }
            Err(err) if matches!(err.kind(), ErrorKind::BrokenPipe | ErrorKind::NotConnected) => {
                Err(TransportError::Disconnected(format!("{}: {}", self.name, err)))
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(feature = "serial")]
pub use port::SerialLineTransport;

#[cfg(feature = "serial")]
mod port {
    use super::ReaderTransport;
    use crate::config::SerialConfig;
    use crate::error::TransportError;
    use crate::hal::traits::LineTransport;
    use serialport::{ClearBuffer, SerialPort};
    use std::io::BufReader;
    use tracing::info;

    /// Serial port carrying CSV lines from the FSR board
    pub struct SerialLineTransport {
        inner: ReaderTransport<BufReader<Box<dyn SerialPort>>>,
    }

    impl SerialLineTransport {
        /// Open the port and discard anything buffered before we attached
        pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
            let port = serialport::new(&config.port_name, config.baud_rate)
                .timeout(config.timeout())
                .open()
                .map_err(|e| TransportError::Disconnected(format!("{}: {}", config.port_name, e)))?;

            port.clear(ClearBuffer::Input)
                .map_err(|e| TransportError::Disconnected(format!("{}: {}", config.port_name, e)))?;

            info!(port = %config.port_name, baud = config.baud_rate, "serial port opened");

            Ok(Self {
                inner: ReaderTransport::new(BufReader::new(port), config.port_name.clone(), config.timeout()),
            })
        }
    }

    impl LineTransport for SerialLineTransport {
        fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<(), TransportError> {
            self.inner.read_line(buf)
        }

        fn describe(&self) -> String {
            self.inner.describe()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};

    fn transport(data: &str) -> ReaderTransport<Cursor<Vec<u8>>> {
        ReaderTransport::new(Cursor::new(data.as_bytes().to_vec()), "test", Duration::from_secs(1))
    }

    #[test]
    fn test_lines_strip_terminators() {
        let mut t = transport("1,2,3\r\n4,5,6\n7,8,9");
        let mut buf = Vec::new();

        t.read_line(&mut buf).unwrap();
        assert_eq!(buf, b"1,2,3");
        t.read_line(&mut buf).unwrap();
        assert_eq!(buf, b"4,5,6");
        // Final line without newline still counts
        t.read_line(&mut buf).unwrap();
        assert_eq!(buf, b"7,8,9");

        assert!(matches!(t.read_line(&mut buf), Err(TransportError::Disconnected(_))));
    }

    #[test]
    fn test_empty_line_is_delivered() {
        let mut t = transport("\n");
        let mut buf = vec![b'x'];
        t.read_line(&mut buf).unwrap();
        assert!(buf.is_empty());
    }

    struct TimingOut;

    impl Read for TimingOut {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::TimedOut, "no data"))
        }
    }

    #[test]
    fn test_timeout_mapped() {
        let mut t = ReaderTransport::new(BufReader::new(TimingOut), "slow", Duration::from_millis(250));
        let mut buf = Vec::new();
        match t.read_line(&mut buf) {
            Err(TransportError::Timeout(after)) => assert_eq!(after, Duration::from_millis(250)),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(t.describe(), "slow");
    }
}
