use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split};

use sql_replay_shared::{Command, ReplayError, ReplayRecord, Result};

/// Decodes one tab-separated trace line:
/// `session_id \t capture_time \t command_code \t statement`.
/// The statement is the remainder of the line and may contain tabs.
pub fn parse_record(line: &str, line_no: u64) -> Result<ReplayRecord> {
    let malformed = |reason: String| ReplayError::Trace { line: line_no, reason };

    let mut fields = line.splitn(4, '\t');
    let (session, capture, command) = match (fields.next(), fields.next(), fields.next()) {
        (Some(s), Some(t), Some(c)) => (s, t, c),
        _ => return Err(malformed("expected at least 3 tab-separated fields".into())),
    };
    let statement = fields.next().unwrap_or("");

    let session_id: i64 = session
        .trim()
        .parse()
        .map_err(|e| malformed(format!("session id '{}': {}", session, e)))?;
    let capture_time: f64 = capture
        .trim()
        .parse()
        .map_err(|e| malformed(format!("capture time '{}': {}", capture, e)))?;
    let code: i64 = command
        .trim()
        .parse()
        .map_err(|e| malformed(format!("command code '{}': {}", command, e)))?;

    let record = ReplayRecord::new(session_id, capture_time, Command::from_code(code), statement);
    if record.captured_at().is_none() {
        return Err(malformed(format!("capture time '{}' is out of range", capture)));
    }
    Ok(record)
}

/// Streams records out of a trace in file order.
pub struct TraceReader<R> {
    lines: Split<R>,
    line_no: u64,
}

impl TraceReader<BufReader<File>> {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.split(b'\n'),
            line_no: 0,
        }
    }

    /// `None` at end of input. A malformed line yields `ReplayError::Trace`
    /// and the next call continues with the following line; a read failure
    /// yields `ReplayError::Io`.
    pub async fn next_record(&mut self) -> Option<Result<ReplayRecord>> {
        loop {
            let segment = match self.lines.next_segment().await {
                Ok(Some(segment)) => segment,
                Ok(None) => return None,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;

            let line = match std::str::from_utf8(&segment) {
                Ok(line) => line.trim_end_matches('\r'),
                Err(e) => {
                    return Some(Err(ReplayError::Trace {
                        line: self.line_no,
                        reason: format!("invalid UTF-8: {}", e),
                    }))
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            return Some(parse_record(line, self.line_no));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        let record = parse_record("7\t100.25\t3\tSELECT a\tb FROM t", 1).unwrap();
        assert_eq!(record.session_id, 7);
        assert_eq!(record.capture_time, 100.25);
        assert_eq!(record.command, Command::Query);
        assert_eq!(record.statement, "SELECT a\tb FROM t");

        let quit = parse_record("7\t100.5\t1", 2).unwrap();
        assert_eq!(quit.command, Command::Quit);
        assert_eq!(quit.statement, "");

        let wide = parse_record("7\t100.5\t300\tx", 3).unwrap();
        assert_eq!(wide.command, Command::Other(300));
    }

    #[test]
    fn test_parse_record_malformed() {
        let lines = [
            "x\t1.0\t3\tSELECT 1",
            "1\tnow\t3\tSELECT 1",
            "1\t1.0\tq\tSELECT 1",
            "1\t1.0",
            "1\tNaN\t3\t",
            "1\t1e300\t3\tSELECT 1",
            "1\t-1e300\t3\t",
        ];
        for line in lines {
            match parse_record(line, 9) {
                Err(ReplayError::Trace { line: 9, .. }) => {}
                other => panic!("expected malformed record for {:?}, got {:?}", line, other),
            }
        }
    }

    #[tokio::test]
    async fn test_reader_skips_malformed_and_blank_lines() {
        let data = "1\t10.0\t3\tSELECT 1\n\nbad\t10.1\t3\tSELECT 2\r\n2\t10.2\t14\t\n";
        let mut reader = TraceReader::new(data.as_bytes());

        let first = reader.next_record().await.unwrap().unwrap();
        assert_eq!(first.session_id, 1);

        match reader.next_record().await.unwrap() {
            Err(ReplayError::Trace { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected malformed record, got {:?}", other),
        }

        let ping = reader.next_record().await.unwrap().unwrap();
        assert_eq!(ping.session_id, 2);
        assert_eq!(ping.command, Command::Ping);

        assert!(reader.next_record().await.is_none());
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        assert!(matches!(
            TraceReader::open("/nonexistent/trace.dat").await,
            Err(ReplayError::Io(_))
        ));
    }
}
