//! Shell-style command echo with secret redaction.

use super::Tracer;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;

/// Writes `$ program args...` lines to a writer.
///
/// Arguments registered as secrets are replaced by their placeholder before
/// anything is written.
pub struct ExecTracer {
    writer: Mutex<Box<dyn Write + Send>>,
    secrets: HashMap<String, String>,
}

impl ExecTracer {
    /// Creates a tracer writing to `writer`.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            secrets: HashMap::new(),
        }
    }

    /// Creates a tracer writing to standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    /// Registers a secret and the placeholder printed in its place.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>, placeholder: impl Into<String>) -> Self {
        self.secrets.insert(secret.into(), placeholder.into());
        self
    }

    /// Registers many secrets at once.
    #[must_use]
    pub fn with_secrets<I, K, V>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.secrets
            .extend(secrets.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Renders a traced command line with secrets redacted.
    #[must_use]
    pub fn render(&self, stage: &str, args: &[String]) -> String {
        let mut line = String::from("$ ");
        line.push_str(&quote(stage));
        for arg in args {
            line.push(' ');
            match self.secrets.get(arg) {
                Some(placeholder) => line.push_str(placeholder),
                None => line.push_str(&quote(arg)),
            }
        }
        line
    }

    pub(crate) fn render_plain(stage: &str, args: &[String]) -> String {
        std::iter::once(stage)
            .chain(args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Tracer for ExecTracer {
    fn trace(&self, stage: &str, args: &[String]) {
        let mut line = self.render(stage, args);
        line.push('\n');
        // A broken trace sink must not fail the pipeline.
        let _ = self.writer.lock().write_all(line.as_bytes());
    }
}

impl std::fmt::Debug for ExecTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecTracer")
            .field("secrets", &self.secrets.len())
            .finish_non_exhaustive()
    }
}

/// Quotes a token the way a shell user would type it.
fn quote(token: &str) -> String {
    if token.is_empty() {
        return "''".to_string();
    }
    if !token.contains(char::is_whitespace) {
        return token.to_string();
    }
    match (token.contains('"'), token.contains('\'')) {
        (true, true) => format!("$'{}'", token.replace('\'', "\\'").replace('\n', "\\n")),
        (true, false) => format!("'{token}'"),
        _ => format!("\"{token}\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_render_redacts_secrets() {
        let tracer = ExecTracer::new(std::io::sink()).with_secret("hunter2", "<password>");
        let line = tracer.render("curl", &args(&["-u", "hunter2", "https://example.com"]));
        assert_eq!(line, "$ curl -u <password> https://example.com");
    }

    #[test]
    fn test_render_quotes_whitespace() {
        let tracer = ExecTracer::new(std::io::sink());
        assert_eq!(
            tracer.render("echo", &args(&["hello world", "say \"hi\" now", ""])),
            "$ echo \"hello world\" 'say \"hi\" now' ''"
        );
    }

    #[test]
    fn test_trace_writes_line() {
        let buf = SharedBuf::default();
        let tracer = ExecTracer::new(buf.clone()).with_secrets([("tok", "***")]);
        tracer.trace("git", &args(&["push", "tok"]));
        tracer.trace("ls", &[]);

        let written = String::from_utf8(buf.0.lock().clone()).unwrap();
        assert_eq!(written, "$ git push ***\n$ ls\n");
    }
}
