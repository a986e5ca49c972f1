//! Async transport: the `tokio`-based counterpart to [`crate::sync`], driving a [`Request`] to
//! completion over a `tokio::net::TcpStream`.

use crate::error::{CorbaError, CorbaResult};
use crate::exception::{CompletionStatus, ExceptionHolder, SystemException, SystemExceptionKind};
use crate::giop::{next_request_id, Header, MessageType, ReplyBody, ReplyStatus, RequestBody};
use crate::params::ConnectParams;
use crate::request::{Direction, Request};
use crate::security::ServiceContext;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Opens a connection to `request`'s target and drives it through one request/reply round trip
/// (or, for a one-way request, just the write).
pub async fn invoke(request: &Request, params: &ConnectParams) -> CorbaResult<()> {
    invoke_with_contexts(request, params, Vec::new()).await
}

/// As [`invoke`], but attaching the given service contexts (security credentials, an active
/// transaction's propagation context) to the outgoing GIOP Request header.
pub async fn invoke_with_contexts(
    request: &Request,
    params: &ConnectParams,
    service_contexts: Vec<ServiceContext>,
) -> CorbaResult<()> {
    request.mark_in_progress()?;
    debug!("invoking {} on {}", request.operation(), params.addr());
    match run(request, params, service_contexts).await {
        Ok(()) => {
            debug!("{} completed", request.operation());
            Ok(())
        }
        Err(CorbaError::Io { .. }) | Err(CorbaError::Truncated(_)) => {
            warn!("{} failed with a comm failure against {}", request.operation(), params.addr());
            request.complete_exception(comm_failure())
        }
        Err(other) => Err(other),
    }
}

fn comm_failure() -> ExceptionHolder {
    ExceptionHolder::System(SystemException::new(SystemExceptionKind::CommFailure, 0, CompletionStatus::NotCompleted))
}

async fn run(request: &Request, params: &ConnectParams, service_contexts: Vec<ServiceContext>) -> CorbaResult<()> {
    let profile = request
        .target()
        .primary_iiop_profile()?
        .ok_or(CorbaError::Usage("target object reference has no IIOP profile"))?;

    let connect = TcpStream::connect((profile.host.as_str(), profile.port));
    let mut stream = timeout(params.timeout(), connect)
        .await
        .map_err(|_| CorbaError::Io { source: std::io::Error::from(std::io::ErrorKind::TimedOut) })??;

    let arguments = request
        .parameters()?
        .into_iter()
        .filter(|p| matches!(p.direction, Direction::In | Direction::InOut))
        .map(|p| p.value)
        .collect();

    let body = RequestBody {
        request_id: next_request_id(),
        response_expected: request.response_expected(),
        object_key: profile.object_key,
        operation: request.operation().to_string(),
        service_contexts,
        arguments,
    };
    let encoded = body.encode(params.giop_version())?;
    let header = Header {
        version: params.giop_version(),
        little_endian: false,
        fragment: false,
        message_type: MessageType::Request,
        message_size: encoded.len() as u32,
    };

    let write = async {
        stream.write_all(&header.encode()).await?;
        stream.write_all(&encoded).await?;
        stream.flush().await
    };
    timeout(params.timeout(), write)
        .await
        .map_err(|_| CorbaError::Io { source: std::io::Error::from(std::io::ErrorKind::TimedOut) })??;

    if !request.response_expected() {
        return request.complete_one_way();
    }

    let read_reply = async {
        let mut header_buf = [0u8; 12];
        stream.read_exact(&mut header_buf).await?;
        let reply_header = Header::decode(&header_buf)?;
        if reply_header.message_type != MessageType::Reply {
            error!("unexpected GIOP message type in reply: {:?}", reply_header.message_type);
            return Err(CorbaError::UsageDetailed(format!(
                "unexpected GIOP message type in reply: {:?}",
                reply_header.message_type
            )));
        }
        let mut body_buf = vec![0u8; reply_header.message_size as usize];
        stream.read_exact(&mut body_buf).await?;
        ReplyBody::decode(&body_buf)
    };
    let reply = timeout(params.timeout(), read_reply)
        .await
        .map_err(|_| CorbaError::Io { source: std::io::Error::from(std::io::ErrorKind::TimedOut) })??;

    match reply.status {
        ReplyStatus::NoException(any) => request.complete_ok(any),
        ReplyStatus::UserException(holder) => request.complete_exception(holder),
        ReplyStatus::SystemException(holder) => request.complete_exception(holder),
        ReplyStatus::LocationForward => Err(CorbaError::Impl("LOCATION_FORWARD replies are not followed by this runtime")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ior::{IiopProfileBody, ObjectRef, Profile};
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn target(port: u16) -> ObjectRef {
        let body = IiopProfileBody::new(1, 2, "127.0.0.1", port, b"Calc".to_vec());
        ObjectRef::new("IDL:Calc:1.0", vec![Profile::iiop(&body)]).unwrap()
    }

    #[tokio::test]
    async fn connection_refused_surfaces_as_comm_failure() {
        let req = Request::new(target(0), "add");
        let params = ConnectParams::builder()
            .hostname("127.0.0.1")
            .port(0)
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        invoke(&req, &params).await.unwrap();
        assert_eq!(req.status().unwrap(), crate::request::Status::Error);
        match req.exception().unwrap() {
            Some(ExceptionHolder::System(ex)) => assert_eq!(ex.kind, SystemExceptionKind::CommFailure),
            other => panic!("expected COMM_FAILURE, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_way_invocation_completes_once_the_request_is_flushed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 12];
            let _ = stream.read(&mut buf).await;
        });

        let req = Request::one_way(target(port), "log");
        let params = ConnectParams::builder().hostname("127.0.0.1").port(port).build().unwrap();
        invoke(&req, &params).await.unwrap();
        assert_eq!(req.status().unwrap(), crate::request::Status::Completed);
        handle.await.unwrap();
    }
}
