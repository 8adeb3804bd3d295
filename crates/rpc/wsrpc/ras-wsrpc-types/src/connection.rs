//! Transport connection trait

use crate::{ConnectionId, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A live, ordered, duplex message stream to one client
///
/// Implemented by the transport. The core only holds handles between the
/// open and close events of a connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the connection ID
    fn id(&self) -> ConnectionId;

    /// Write one text frame
    async fn send_text(&self, text: String) -> Result<()>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is still open
    fn is_open(&self) -> bool;
}

/// Shared handle to a connection
pub type ConnectionHandle = Arc<dyn Connection>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WsRpcError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    struct MockConnection {
        id: ConnectionId,
        open: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    impl MockConnection {
        fn new() -> Self {
            Self {
                id: ConnectionId::new(),
                open: AtomicBool::new(true),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Connection for MockConnection {
        fn id(&self) -> ConnectionId {
            self.id
        }

        async fn send_text(&self, text: String) -> Result<()> {
            if !self.is_open() {
                return Err(WsRpcError::ConnectionClosed(self.id));
            }
            self.sent.lock().await.push(text);
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.open.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_handles_compare_by_id() {
        let a: ConnectionHandle = Arc::new(MockConnection::new());
        let b: ConnectionHandle = Arc::new(MockConnection::new());
        let a2 = a.clone();

        assert_eq!(a.id(), a2.id());
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_sends() {
        let conn = MockConnection::new();
        conn.send_text("first".to_string()).await.unwrap();
        conn.close().await.unwrap();

        assert!(!conn.is_open());
        assert!(matches!(
            conn.send_text("second".to_string()).await,
            Err(WsRpcError::ConnectionClosed(_))
        ));
        assert_eq!(conn.sent.lock().await.as_slice(), ["first".to_string()]);
    }
}
