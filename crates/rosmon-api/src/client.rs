use crate::error::{ApiError, Result};
use crate::sentence::{encode_sentence, read_sentence, Sentence};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Reply to a single command: the `!re` data sentences in the order the
/// device sent them, and the closing `!done` sentence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub re: Vec<Sentence>,
    pub done: Sentence,
}

/// Executes commands against a connected, authenticated device.
#[async_trait]
pub trait Client: Send + Sync {
    /// Run one command. `words` is the command path followed by its
    /// arguments, e.g. `["/system/health/print", "=.proplist=name,value"]`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, timeout, or when the device
    /// answers with `!trap` or `!fatal`.
    async fn run(&self, words: &[&str]) -> Result<Reply>;
}

/// RouterOS API client over any byte stream, normally a [`TcpStream`].
///
/// Commands are serialized through a mutex: the protocol is strictly one
/// request, one reply on an untagged session.
pub struct RouterOsClient<S> {
    stream: Mutex<S>,
    timeout: Duration,
}

impl<S> RouterOsClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: Mutex::new(stream),
            timeout,
        }
    }

    /// Authenticate with the plain-text login used by RouterOS 6.43 and later.
    pub async fn login(&self, user: &str, password: &str) -> Result<()> {
        let name = format!("=name={user}");
        let password = format!("=password={password}");
        let reply = self.call(&["/login", &name, &password]).await?;
        if reply.done.get("ret").is_some() {
            return Err(ApiError::UnsupportedLogin);
        }
        Ok(())
    }

    async fn call(&self, words: &[&str]) -> Result<Reply> {
        let mut stream = self.stream.lock().await;
        // A timed out exchange leaves the session mid-reply; callers drop the
        // client instead of reusing it.
        timeout(self.timeout, exchange(&mut *stream, words))
            .await
            .map_err(|_| ApiError::Timeout(self.timeout))?
    }
}

async fn exchange<S>(stream: &mut S, words: &[&str]) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&encode_sentence(words)).await?;
    stream.flush().await?;

    let mut re = Vec::new();
    let mut trap: Option<ApiError> = None;

    loop {
        let raw = read_sentence(stream).await?;
        if raw.is_empty() {
            continue;
        }
        if raw[0] == "!fatal" {
            return Err(ApiError::Fatal(raw[1..].join(" ")));
        }

        let sentence = Sentence::parse(raw)?;
        match sentence.word.as_str() {
            "!re" => re.push(sentence),
            // RouterOS 7.18+ announces an empty result before `!done`.
            "!empty" => {}
            "!trap" => {
                trap = Some(ApiError::Trap {
                    category: sentence.get("category").map(str::to_string),
                    message: sentence.get("message").unwrap_or_default().to_string(),
                });
            }
            "!done" => {
                return match trap {
                    Some(err) => Err(err),
                    None => Ok(Reply { re, done: sentence }),
                };
            }
            other => {
                return Err(ApiError::Protocol(format!("unexpected reply word {other:?}")));
            }
        }
    }
}

#[async_trait]
impl<S> Client for RouterOsClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn run(&self, words: &[&str]) -> Result<Reply> {
        self.call(words).await
    }
}

/// Open a TCP connection to `address:port` and log in.
///
/// `timeout` bounds the connect, the login, and every later command.
pub async fn connect(
    address: &str,
    port: u16,
    user: &str,
    password: &str,
    timeout_after: Duration,
) -> Result<RouterOsClient<TcpStream>> {
    let stream = timeout(timeout_after, TcpStream::connect((address, port)))
        .await
        .map_err(|_| ApiError::Timeout(timeout_after))??;
    stream.set_nodelay(true)?;

    let client = RouterOsClient::new(stream, timeout_after);
    client.login(user, password).await?;
    tracing::debug!(address, port, "Logged in to RouterOS API");
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    /// Reads one request from `server` and answers with `replies`.
    async fn respond(server: &mut DuplexStream, replies: &[&[&str]]) -> Vec<String> {
        let request = read_sentence(server).await.expect("request should decode");
        for reply in replies {
            server
                .write_all(&encode_sentence(reply))
                .await
                .expect("reply should be written");
        }
        request
    }

    #[tokio::test]
    async fn run_collects_re_sentences_until_done() {
        let (client_end, mut server) = duplex(4096);
        let client = RouterOsClient::new(client_end, Duration::from_secs(5));

        let device = tokio::spawn(async move {
            respond(
                &mut server,
                &[
                    &["!re", "=name=voltage", "=value=24.1"],
                    &["!re", "=name=temperature", "=value=37"],
                    &["!done"],
                ],
            )
            .await
        });

        let reply = client
            .run(&["/system/health/print", "=.proplist=name,value"])
            .await
            .unwrap();
        let request = device.await.unwrap();

        assert_eq!(request, vec!["/system/health/print", "=.proplist=name,value"]);
        assert_eq!(reply.re.len(), 2);
        assert_eq!(reply.re[0].get("name"), Some("voltage"));
        assert_eq!(reply.re[1].get("value"), Some("37"));
        assert_eq!(reply.done.word, "!done");
    }

    #[tokio::test]
    async fn empty_result_is_an_empty_reply() {
        let (client_end, mut server) = duplex(4096);
        let client = RouterOsClient::new(client_end, Duration::from_secs(5));

        tokio::spawn(async move { respond(&mut server, &[&["!empty"], &["!done"]]).await });

        let reply = client
            .run(&["/system/health/print", "=.proplist=name,value"])
            .await
            .unwrap();
        assert!(reply.re.is_empty());
        assert_eq!(reply.done.word, "!done");
    }

    #[tokio::test]
    async fn unknown_reply_word_is_a_protocol_error() {
        let (client_end, mut server) = duplex(4096);
        let client = RouterOsClient::new(client_end, Duration::from_secs(5));

        tokio::spawn(async move { respond(&mut server, &[&["!bogus"], &["!done"]]).await });

        let err = client.run(&["/system/health/print"]).await.unwrap_err();
        assert!(matches!(err, ApiError::Protocol(_)));
    }

    #[tokio::test]
    async fn trap_is_reported_after_done() {
        let (client_end, mut server) = duplex(4096);
        let client = RouterOsClient::new(client_end, Duration::from_secs(5));

        tokio::spawn(async move {
            respond(
                &mut server,
                &[
                    &["!trap", "=category=0", "=message=no such command"],
                    &["!done"],
                ],
            )
            .await
        });

        let err = client.run(&["/system/bogus/print"]).await.unwrap_err();
        match err {
            ApiError::Trap { category, message } => {
                assert_eq!(category.as_deref(), Some("0"));
                assert_eq!(message, "no such command");
            }
            other => panic!("expected trap, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fatal_ends_the_exchange() {
        let (client_end, mut server) = duplex(4096);
        let client = RouterOsClient::new(client_end, Duration::from_secs(5));

        tokio::spawn(async move {
            respond(&mut server, &[&["!fatal", "session terminated"]]).await
        });

        let err = client.run(&["/system/health/print"]).await.unwrap_err();
        assert!(matches!(err, ApiError::Fatal(ref m) if m == "session terminated"));
    }

    #[tokio::test]
    async fn silent_device_times_out() {
        let (client_end, _server) = duplex(4096);
        let client = RouterOsClient::new(client_end, Duration::from_millis(50));

        let err = client.run(&["/system/health/print"]).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout(_)));
    }

    #[tokio::test]
    async fn closed_connection_is_an_io_error() {
        let (client_end, server) = duplex(4096);
        drop(server);
        let client = RouterOsClient::new(client_end, Duration::from_secs(5));

        let err = client.run(&["/system/health/print"]).await.unwrap_err();
        assert!(matches!(err, ApiError::Io(_)));
    }

    #[tokio::test]
    async fn login_sends_credentials() {
        let (client_end, mut server) = duplex(4096);
        let client = RouterOsClient::new(client_end, Duration::from_secs(5));

        let device = tokio::spawn(async move { respond(&mut server, &[&["!done"]]).await });

        client.login("prometheus", "s3cr=t").await.unwrap();
        let request = device.await.unwrap();
        assert_eq!(request, vec!["/login", "=name=prometheus", "=password=s3cr=t"]);
    }

    #[tokio::test]
    async fn legacy_login_challenge_is_rejected() {
        let (client_end, mut server) = duplex(4096);
        let client = RouterOsClient::new(client_end, Duration::from_secs(5));

        tokio::spawn(async move {
            respond(&mut server, &[&["!done", "=ret=ebddd18303a54111e2dea05a92ab46b4"]]).await
        });

        let err = client.login("admin", "").await.unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedLogin));
    }
}
