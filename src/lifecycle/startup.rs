//! Listener acquisition.
//!
//! # Responsibilities
//! - Bind the stream socket, then the datagram socket
//! - Launch the accept loop and the datagram receive loop
//! - Release anything already acquired when a later step fails
//!
//! Rollback is ownership-driven: a bound socket that never reaches a spawned
//! task is dropped on the error path, which closes it.

use std::net::SocketAddr;

use tokio::task::JoinHandle;

use crate::config::RelayConfig;
use crate::hub::{Hub, Protocol};
use crate::lifecycle::controller::LifecycleError;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{ConnectionRegistry, DatagramListener, Listener, ListenerError, StreamListener};

/// Addresses the listeners actually bound (resolves port 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerAddrs {
    pub stream: SocketAddr,
    pub datagram: SocketAddr,
}

/// Everything the controller must tear down on stop.
#[derive(Debug)]
pub(crate) struct ListenerHandles {
    pub(crate) addrs: ListenerAddrs,
    pub(crate) datagram_shutdown: Shutdown,
    pub(crate) datagram_task: Option<JoinHandle<()>>,
    pub(crate) connection_shutdown: Shutdown,
    pub(crate) accept_shutdown: Shutdown,
    pub(crate) accept_task: Option<JoinHandle<()>>,
}

fn bind_error(protocol: Protocol, address: &str, source: ListenerError) -> LifecycleError {
    LifecycleError::Bind {
        protocol,
        address: address.to_string(),
        source,
    }
}

/// Bind both listeners and launch their tasks.
pub(crate) async fn launch(
    config: &RelayConfig,
    hub: &Hub,
    registry: &ConnectionRegistry,
) -> Result<ListenerHandles, LifecycleError> {
    let stream_address = config.stream.bind_address.as_str();
    let datagram_address = config.datagram.bind_address.as_str();

    let listener = Listener::bind(&config.stream)
        .await
        .map_err(|e| bind_error(Protocol::Stream, stream_address, e))?;
    let stream = StreamListener::new(
        listener,
        registry.clone(),
        hub.clone(),
        config.stream.read_buffer_size,
    );
    let stream_addr = stream
        .local_addr()
        .map_err(|e| bind_error(Protocol::Stream, stream_address, ListenerError::Bind(e)))?;

    let datagram = match DatagramListener::bind(&config.datagram, hub.clone()).await {
        Ok(datagram) => datagram,
        Err(e) => {
            drop(stream);
            tracing::warn!(address = %stream_addr, "Released stream listener after datagram bind failure");
            return Err(bind_error(Protocol::Datagram, datagram_address, e));
        }
    };
    let datagram_addr = datagram
        .local_addr()
        .map_err(|e| bind_error(Protocol::Datagram, datagram_address, ListenerError::Bind(e)))?;

    let datagram_shutdown = Shutdown::new();
    let datagram_task = tokio::spawn(datagram.run(datagram_shutdown.subscribe()));

    let connection_shutdown = Shutdown::new();
    let accept_shutdown = Shutdown::new();
    let accept_task = tokio::spawn(stream.run(
        accept_shutdown.subscribe(),
        connection_shutdown.subscribe(),
    ));

    Ok(ListenerHandles {
        addrs: ListenerAddrs {
            stream: stream_addr,
            datagram: datagram_addr,
        },
        datagram_shutdown,
        datagram_task: Some(datagram_task),
        connection_shutdown,
        accept_shutdown,
        accept_task: Some(accept_task),
    })
}
