//! Blocking transport: drives a [`Request`] to completion over a `TcpStream`, addressed by its
//! target's primary IIOP profile.
//!
//! Opening and framing the socket is the minimal plumbing this runtime needs to exercise the
//! wire layer end to end; the ORB shell (listener sockets, thread pools, servant dispatch loops)
//! is a collaborator referenced only by interface, not built here.

use crate::error::{CorbaError, CorbaResult};
use crate::exception::{CompletionStatus, ExceptionHolder, SystemException, SystemExceptionKind};
use crate::giop::{next_request_id, Header, MessageType, ReplyBody, ReplyStatus, RequestBody};
use crate::params::ConnectParams;
use crate::request::{Direction, Request};
use crate::security::ServiceContext;
use std::io::{Read, Write};
use std::net::TcpStream;

/// Opens a connection to `request`'s target and drives it through one request/reply round trip
/// (or, for a one-way request, just the write).
pub fn invoke(request: &Request, params: &ConnectParams) -> CorbaResult<()> {
    invoke_with_contexts(request, params, Vec::new())
}

/// As [`invoke`], but attaching the given service contexts (security credentials, an active
/// transaction's propagation context) to the outgoing GIOP Request header.
pub fn invoke_with_contexts(
    request: &Request,
    params: &ConnectParams,
    service_contexts: Vec<ServiceContext>,
) -> CorbaResult<()> {
    request.mark_in_progress()?;
    debug!("invoking {} on {}", request.operation(), params.addr());
    match run(request, params, service_contexts) {
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

fn run(request: &Request, params: &ConnectParams, service_contexts: Vec<ServiceContext>) -> CorbaResult<()> {
    let profile = request
        .target()
        .primary_iiop_profile()?
        .ok_or(CorbaError::Usage("target object reference has no IIOP profile"))?;

    let mut stream = TcpStream::connect((profile.host.as_str(), profile.port))?;
    stream.set_read_timeout(Some(params.timeout()))?;
    stream.set_write_timeout(Some(params.timeout()))?;

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
    stream.write_all(&header.encode())?;
    stream.write_all(&encoded)?;
    stream.flush()?;

    if !request.response_expected() {
        return request.complete_one_way();
    }

    let mut header_buf = [0u8; 12];
    stream.read_exact(&mut header_buf)?;
    let reply_header = Header::decode(&header_buf)?;
    if reply_header.message_type != MessageType::Reply {
        error!("unexpected GIOP message type in reply: {:?}", reply_header.message_type);
        return Err(CorbaError::UsageDetailed(format!(
            "unexpected GIOP message type in reply: {:?}",
            reply_header.message_type
        )));
    }
    let mut body_buf = vec![0u8; reply_header.message_size as usize];
    stream.read_exact(&mut body_buf)?;
    let reply = ReplyBody::decode(&body_buf)?;

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
    use std::io::Read as _;
    use std::net::TcpListener;
    use std::time::Duration;

    fn target(port: u16) -> ObjectRef {
        let body = IiopProfileBody::new(1, 2, "127.0.0.1", port, b"Calc".to_vec());
        ObjectRef::new("IDL:Calc:1.0", vec![Profile::iiop(&body)]).unwrap()
    }

    #[test]
    fn connection_refused_surfaces_as_comm_failure() {
        // Port 0 never accepts; the OS rejects the connect attempt immediately.
        let req = Request::new(target(0), "add");
        let params = ConnectParams::builder()
            .hostname("127.0.0.1")
            .port(0)
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        invoke(&req, &params).unwrap();
        assert_eq!(req.status().unwrap(), crate::request::Status::Error);
        match req.exception().unwrap() {
            Some(ExceptionHolder::System(ex)) => assert_eq!(ex.kind, SystemExceptionKind::CommFailure),
            other => panic!("expected COMM_FAILURE, got {other:?}"),
        }
    }

    #[test]
    fn one_way_invocation_completes_once_the_request_is_flushed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 12];
            let _ = stream.read(&mut buf);
        });

        let req = Request::one_way(target(port), "log");
        let params = ConnectParams::builder().hostname("127.0.0.1").port(port).build().unwrap();
        invoke(&req, &params).unwrap();
        assert_eq!(req.status().unwrap(), crate::request::Status::Completed);
        handle.join().unwrap();
    }
}
