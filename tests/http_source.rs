//! Integration tests for HTTP range streaming against a loopback server.

#![cfg(feature = "http")]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use blobstream::{
    open_url, ChunkReaderConfig, HttpAuthConfig, HttpConfig, HttpRangeSource, RandomAccessSource,
    StreamingError,
};

const TOKEN: &str = "s3cret";

/// Minimal HTTP/1.1 server that understands HEAD, GET and single `Range` headers.
///
/// Paths:
/// - `/blob`: range-capable object
/// - `/private`: like `/blob` but requires `Authorization: Bearer s3cret`
/// - `/whole`: ignores `Range` and always answers 200 with the full body
/// - `/norange`: advertises `Accept-Ranges: none`
/// - anything else: 404
fn serve(data: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let data = Arc::new(data);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let data = Arc::clone(&data);
            thread::spawn(move || {
                let _ = handle(stream, &data);
            });
        }
    });

    format!("http://{addr}")
}

fn handle(stream: TcpStream, data: &[u8]) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line)? == 0 {
            return Ok(());
        }
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_owned();
        let path = parts.next().unwrap_or_default().to_owned();

        let mut range = None;
        let mut authorized = false;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                let value = value.trim();
                match name.to_ascii_lowercase().as_str() {
                    "range" => range = parse_range(value, data.len()),
                    "authorization" => authorized = value == format!("Bearer {TOKEN}"),
                    _ => {}
                }
            }
        }

        let head = method == "HEAD";
        let (status, body, extra): (&str, &[u8], String) = match path.as_str() {
            "/private" if !authorized => ("401 Unauthorized", &[], String::new()),
            "/blob" | "/private" => match range {
                Some((start, end)) if !head => (
                    "206 Partial Content",
                    &data[start..=end],
                    format!(
                        "Accept-Ranges: bytes\r\nContent-Range: bytes {start}-{end}/{}\r\n",
                        data.len()
                    ),
                ),
                _ => ("200 OK", data, "Accept-Ranges: bytes\r\n".to_owned()),
            },
            "/whole" => ("200 OK", data, String::new()),
            "/norange" => ("200 OK", data, "Accept-Ranges: none\r\n".to_owned()),
            _ => ("404 Not Found", &[], String::new()),
        };

        write!(
            writer,
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\n{extra}\r\n",
            body.len()
        )?;
        if !head {
            writer.write_all(body)?;
        }
        writer.flush()?;
    }
}

fn parse_range(value: &str, len: usize) -> Option<(usize, usize)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end: usize = end.parse::<usize>().ok()?.min(len.checked_sub(1)?);
    (start <= end).then_some((start, end))
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn quick_config() -> HttpConfig {
    HttpConfig {
        timeout_secs: 5,
        max_retries: 0,
        ..Default::default()
    }
}

#[test]
fn http_source_reads_ranges() {
    let data = pattern(1000);
    let base = serve(data.clone());

    let source = HttpRangeSource::with_config(format!("{base}/blob"), quick_config()).unwrap();
    assert_eq!(source.total_size().unwrap(), 1000);
    assert_eq!(source.source_id(), format!("{base}/blob"));

    let mut buf = [0u8; 100];
    assert_eq!(source.read_at(&mut buf, 450).unwrap(), 100);
    assert_eq!(&buf[..], &data[450..550]);

    // Final range is short, not an error.
    assert_eq!(source.read_at(&mut buf, 960).unwrap(), 40);
    assert_eq!(&buf[..40], &data[960..]);

    assert_eq!(source.read_at(&mut buf, 1000).unwrap(), 0);
}

#[test]
fn http_source_skips_prefix_when_range_is_ignored() {
    let data = pattern(300);
    let base = serve(data.clone());

    let source = HttpRangeSource::with_config(format!("{base}/whole"), quick_config()).unwrap();
    let mut buf = [0u8; 50];
    assert_eq!(source.read_at(&mut buf, 120).unwrap(), 50);
    assert_eq!(&buf[..], &data[120..170]);
}

#[test]
fn http_source_reports_missing_and_unsupported() {
    let base = serve(pattern(10));

    let err = HttpRangeSource::with_config(format!("{base}/nope"), quick_config())
        .err()
        .expect("404 must fail");
    assert!(matches!(err, StreamingError::NotFound { .. }));

    let err = HttpRangeSource::with_config(format!("{base}/norange"), quick_config())
        .err()
        .expect("Accept-Ranges: none must fail");
    assert!(matches!(err, StreamingError::RangeNotSupported));
}

#[test]
fn http_source_sends_bearer_token() {
    let data = pattern(64);
    let base = serve(data.clone());
    let url = format!("{base}/private");

    let err = HttpRangeSource::with_config(&url, quick_config())
        .err()
        .expect("unauthenticated request must fail");
    assert!(matches!(err, StreamingError::Http { status: 401, .. }));

    let config = HttpConfig {
        auth: Some(HttpAuthConfig::Bearer(TOKEN.into())),
        ..quick_config()
    };
    let source = HttpRangeSource::with_config(url, config).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(source.read_at(&mut buf, 16).unwrap(), 16);
    assert_eq!(&buf[..], &data[16..32]);
}

#[test]
fn open_url_streams_whole_object() {
    let data = pattern(10_000);
    let base = serve(data.clone());

    let config = ChunkReaderConfig::new(1000, 4);
    let mut reader = open_url(format!("{base}/blob"), quick_config(), config).unwrap();
    assert_eq!(reader.chunk_count(), 10);
    assert_eq!(reader.worker_count(), 4);

    let mut out = Vec::new();
    std::io::copy(&mut reader, &mut out).unwrap();
    assert_eq!(out, data);
    reader.close().unwrap();
}
