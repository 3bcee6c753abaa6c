// HTTP request header parsing

use std::collections::HashMap;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Reads the header section of an HTTP/1.1 request
///
/// Consumes lines up to and including the blank line that ends the header
/// section. Returns the request line verbatim plus a map of the header
/// fields; lines without a colon are skipped.
pub async fn parse_http_header<R>(
    reader: &mut R,
) -> io::Result<(String, HashMap<String, String>)>
where
    R: AsyncBufRead + Unpin,
{
    let mut first_line = String::new();
    let n = reader.read_line(&mut first_line).await?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before the request line",
        ));
    }
    let first_line = first_line.trim_end().to_string();

    let mut headers: HashMap<String, String> = HashMap::new();

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside the header section",
            ));
        }

        let line = line.trim_end();
        if line.is_empty() {
            break;
        }

        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_string(), value.trim().to_string());
        }
    }

    Ok((first_line, headers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_http_header() {
        let bytes: &[u8] =
            b"GET /live/stream1.flv HTTP/1.1\r\nHost: example.org\r\nAccept: */*\r\n\r\n";
        let mut reader = bytes;

        let (first_line, headers) = parse_http_header(&mut reader).await.unwrap();

        assert_eq!(first_line, "GET /live/stream1.flv HTTP/1.1");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Host").map(String::as_str), Some("example.org"));
        assert_eq!(headers.get("Accept").map(String::as_str), Some("*/*"));
    }

    #[tokio::test]
    async fn test_parse_http_header_eof_before_blank_line() {
        let bytes: &[u8] = b"GET / HTTP/1.1\r\nHost: example.org\r\n";
        let mut reader = bytes;

        let res = parse_http_header(&mut reader).await;

        assert!(res.is_err());
    }
}
