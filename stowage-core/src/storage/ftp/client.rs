//! Minimal FTP control/data connection handling (RFC 959, passive mode)

use crate::error::{Result, StowageError};
use std::net::IpAddr;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// "Requested action not taken. File unavailable."
pub const FILE_UNAVAILABLE: u16 = 550;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

fn unexpected(command: &str, reply: &Reply) -> StowageError {
    StowageError::RemoteProtocol(format!(
        "ftp {} failed: {} {}",
        command, reply.code, reply.text
    ))
}

fn expect(command: &str, reply: &Reply, accepted: &[u16]) -> Result<()> {
    if accepted.contains(&reply.code) {
        Ok(())
    } else {
        Err(unexpected(command, reply))
    }
}

/// Extract the data port from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply.
pub fn parse_pasv_port(text: &str) -> Result<u16> {
    let inner = match (text.find('('), text.rfind(')')) {
        (Some(start), Some(end)) if start < end => &text[start + 1..end],
        _ => text
            .split_whitespace()
            .find(|token| token.matches(',').count() == 5)
            .map(|token| token.trim_matches(|c: char| !c.is_ascii_digit()))
            .unwrap_or_default(),
    };

    let numbers: Vec<u8> = inner
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| StowageError::RemoteProtocol(format!("malformed PASV reply: {}", text)))?;

    if numbers.len() != 6 {
        return Err(StowageError::RemoteProtocol(format!(
            "malformed PASV reply: {}",
            text
        )));
    }

    Ok(u16::from(numbers[4]) << 8 | u16::from(numbers[5]))
}

/// One logged-in control connection.
pub struct FtpSession {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer_ip: IpAddr,
}

impl FtpSession {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        let peer_ip = stream.peer_addr()?.ip();
        let (read_half, write_half) = stream.into_split();

        let mut session = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer_ip,
        };

        let greeting = session.read_reply().await?;
        expect("connect", &greeting, &[220])?;
        Ok(session)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let reply = self.command(&format!("USER {}", username)).await?;
        match reply.code {
            230 => return Ok(()),
            331 | 332 => {}
            _ => return Err(unexpected("USER", &reply)),
        }

        let reply = self.command(&format!("PASS {}", password)).await?;
        expect("PASS", &reply, &[230, 202])
    }

    pub async fn binary_mode(&mut self) -> Result<()> {
        let reply = self.command("TYPE I").await?;
        expect("TYPE", &reply, &[200])
    }

    pub async fn command(&mut self, line: &str) -> Result<Reply> {
        if line.contains(['\r', '\n']) {
            return Err(StowageError::Internal(
                "ftp command contains a line break".to_string(),
            ));
        }

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        self.read_reply().await
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(StowageError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "ftp control connection closed",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read a single or multi-line (`123-` ... `123 `) reply.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let first = self.read_line().await?;
        let code = first
            .get(..3)
            .and_then(|digits| digits.parse::<u16>().ok())
            .ok_or_else(|| {
                StowageError::RemoteProtocol(format!("malformed ftp reply: {:?}", first))
            })?;

        let mut text = first.get(4..).unwrap_or_default().to_string();

        if first.as_bytes().get(3) == Some(&b'-') {
            let terminator = format!("{} ", code);
            let bare = code.to_string();
            loop {
                let line = self.read_line().await?;
                text.push('\n');
                if line.starts_with(&terminator) || line == bare {
                    text.push_str(line.get(4..).unwrap_or_default());
                    break;
                }
                text.push_str(&line);
            }
        }

        Ok(Reply { code, text })
    }

    async fn open_data_connection(&mut self) -> Result<TcpStream> {
        let reply = self.command("PASV").await?;
        expect("PASV", &reply, &[227])?;
        let port = parse_pasv_port(&reply.text)?;

        // The advertised address is often a private one behind NAT; the
        // control connection's peer is reachable by construction.
        Ok(TcpStream::connect((self.peer_ip, port)).await?)
    }

    pub async fn store(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let mut data_stream = self.open_data_connection().await?;

        let reply = self.command(&format!("STOR {}", path)).await?;
        expect("STOR", &reply, &[125, 150])?;

        data_stream.write_all(data).await?;
        data_stream.shutdown().await?;
        drop(data_stream);

        let reply = self.read_reply().await?;
        expect("STOR", &reply, &[226, 250])
    }

    /// Download a file. `Ok(None)` when the server reports it unavailable.
    pub async fn retrieve(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        let mut data_stream = self.open_data_connection().await?;

        let reply = self.command(&format!("RETR {}", path)).await?;
        if reply.code == FILE_UNAVAILABLE {
            return Ok(None);
        }
        expect("RETR", &reply, &[125, 150])?;

        let mut data = Vec::new();
        data_stream.read_to_end(&mut data).await?;
        drop(data_stream);

        let reply = self.read_reply().await?;
        expect("RETR", &reply, &[226, 250])?;
        Ok(Some(data))
    }

    /// `SIZE` query. `Ok(None)` when the server reports the file unavailable.
    pub async fn size(&mut self, path: &str) -> Result<Option<u64>> {
        let reply = self.command(&format!("SIZE {}", path)).await?;
        match reply.code {
            213 => reply
                .text
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| unexpected("SIZE", &reply)),
            FILE_UNAVAILABLE => Ok(None),
            _ => Err(unexpected("SIZE", &reply)),
        }
    }

    /// `DELE`. Returns false when the file was already unavailable.
    pub async fn delete(&mut self, path: &str) -> Result<bool> {
        let reply = self.command(&format!("DELE {}", path)).await?;
        match reply.code {
            250 => Ok(true),
            FILE_UNAVAILABLE => Ok(false),
            _ => Err(unexpected("DELE", &reply)),
        }
    }

    /// `MKD`, tolerating directories that already exist.
    pub async fn make_dir(&mut self, path: &str) -> Result<()> {
        let reply = self.command(&format!("MKD {}", path)).await?;
        expect("MKD", &reply, &[257, 521, FILE_UNAVAILABLE])
    }

    pub async fn quit(mut self) {
        if let Err(error) = self.command("QUIT").await {
            tracing::debug!("ftp QUIT failed: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pasv_port() {
        assert_eq!(
            parse_pasv_port("Entering Passive Mode (127,0,0,1,195,80)").unwrap(),
            195 * 256 + 80
        );
        assert_eq!(parse_pasv_port("Entering Passive Mode =10,0,0,5,4,1.").unwrap(), 1025);
        assert!(parse_pasv_port("Entering Passive Mode (1,2,3)").is_err());
        assert!(parse_pasv_port("garbage").is_err());
    }
}
