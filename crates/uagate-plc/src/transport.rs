// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Request/response exchange over a TCP stream.
//!
//! Every TCP-based PLC protocol here frames its responses with a fixed-size
//! header that carries the length of the remainder. [`TcpLink::transact`]
//! writes one request, reads the header, asks the protocol for the body
//! length and reads the body, all under the operation timeout.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{PlcError, PlcResult};

/// One TCP session to a controller.
#[derive(Debug)]
pub(crate) struct TcpLink {
    stream: TcpStream,
    operation_timeout: Duration,
}

impl TcpLink {
    /// Opens the TCP connection.
    pub(crate) async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        operation_timeout: Duration,
    ) -> PlcResult<Self> {
        let endpoint = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| PlcError::connection(&endpoint, format!("connect timed out after {:?}", connect_timeout)))?
            .map_err(|e| PlcError::connection(&endpoint, e.to_string()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| PlcError::connection(&endpoint, e.to_string()))?;
        Ok(Self {
            stream,
            operation_timeout,
        })
    }

    /// Returns the local address of the stream.
    pub(crate) fn local_addr(&self) -> PlcResult<std::net::SocketAddr> {
        Ok(self.stream.local_addr()?)
    }

    /// Sends `request` and returns the complete response frame.
    ///
    /// `body_len` receives the `header_len` response bytes and returns the
    /// number of bytes that follow.
    pub(crate) async fn transact<F>(
        &mut self,
        operation: &'static str,
        request: &[u8],
        header_len: usize,
        body_len: F,
    ) -> PlcResult<Vec<u8>>
    where
        F: FnOnce(&[u8]) -> PlcResult<usize>,
    {
        let duration = self.operation_timeout;
        let exchange = async {
            self.stream.write_all(request).await?;
            let mut frame = vec![0u8; header_len];
            self.stream.read_exact(&mut frame).await?;
            let remaining = body_len(&frame)?;
            frame.resize(header_len + remaining, 0);
            self.stream.read_exact(&mut frame[header_len..]).await?;
            Ok::<_, PlcError>(frame)
        };
        tokio::time::timeout(duration, exchange)
            .await
            .map_err(|_| PlcError::Timeout { operation, duration })?
    }

    /// Sends a request that has no response.
    pub(crate) async fn send(&mut self, operation: &'static str, request: &[u8]) -> PlcResult<()> {
        let duration = self.operation_timeout;
        tokio::time::timeout(duration, self.stream.write_all(request))
            .await
            .map_err(|_| PlcError::Timeout { operation, duration })??;
        Ok(())
    }

    /// Shuts the stream down. Errors are ignored.
    pub(crate) async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Reads a little-endian `u16` at `offset`.
pub(crate) fn le_u16(frame: &[u8], offset: usize, protocol: &'static str) -> PlcResult<u16> {
    frame
        .get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| PlcError::frame(protocol, format!("frame too short for u16 at {}", offset)))
}

/// Reads a little-endian `u32` at `offset`.
pub(crate) fn le_u32(frame: &[u8], offset: usize, protocol: &'static str) -> PlcResult<u32> {
    frame
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| PlcError::frame(protocol, format!("frame too short for u32 at {}", offset)))
}

/// Reads a big-endian `u16` at `offset`.
pub(crate) fn be_u16(frame: &[u8], offset: usize, protocol: &'static str) -> PlcResult<u16> {
    frame
        .get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| PlcError::frame(protocol, format!("frame too short for u16 at {}", offset)))
}

/// Parses a decimal or `0x` hexadecimal number.
pub(crate) fn parse_number(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
