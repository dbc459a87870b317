// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-process compositor speaking `android_wlegl`, for tests.
//!
//! Runs wayland-backend's server side over one end of a socket pair and
//! records every request it receives from the client on the other end.

use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use wayland_backend::protocol::{Argument, Interface, Message};
use wayland_backend::server::{
    Backend, ClientData, ClientId, GlobalHandler, GlobalId, Handle, ObjectData, ObjectId,
};
use wayland_client::{Connection, EventQueue};

use crate::protocol::__interfaces::ANDROID_WLEGL_INTERFACE;

/// A global whose name only starts with `android_wlegl`.
static WLEGL_V2_INTERFACE: Interface = Interface {
    name: "android_wlegl_v2",
    version: 1,
    requests: &[],
    events: &[],
    c_ptr: None,
};

/// A request as the compositor saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Request {
    Bind(&'static str),
    CreateHandle {
        num_fds: i32,
        ints: Vec<u8>,
    },
    AddFd,
    CreateBuffer {
        width: i32,
        height: i32,
        stride: i32,
        format: i32,
        usage: i32,
    },
    DestroyHandle,
    DestroyBuffer,
}

#[derive(Debug, Default)]
pub(crate) struct Recorded {
    requests: Vec<Request>,
    buffers: Vec<ObjectId>,
}

#[derive(Clone, Copy, Debug)]
enum Kind {
    Wlegl,
    Handle,
    Buffer,
}

#[derive(Debug)]
struct Object(Kind);

impl ObjectData<Recorded> for Object {
    fn request(
        self: Arc<Self>,
        _: &Handle,
        recorded: &mut Recorded,
        _: ClientId,
        msg: Message<ObjectId, OwnedFd>,
    ) -> Option<Arc<dyn ObjectData<Recorded>>> {
        let args: Vec<_> = msg.args.into_iter().collect();
        match (self.0, msg.opcode, args.as_slice()) {
            (
                Kind::Wlegl,
                0,
                [
                    Argument::NewId(_),
                    Argument::Int(num_fds),
                    Argument::Array(ints),
                ],
            ) => {
                recorded.requests.push(Request::CreateHandle {
                    num_fds: *num_fds,
                    ints: ints.to_vec(),
                });
                Some(Arc::new(Self(Kind::Handle)))
            }
            (
                Kind::Wlegl,
                1,
                [
                    Argument::NewId(id),
                    Argument::Int(width),
                    Argument::Int(height),
                    Argument::Int(stride),
                    Argument::Int(format),
                    Argument::Int(usage),
                    Argument::Object(_),
                ],
            ) => {
                recorded.requests.push(Request::CreateBuffer {
                    width: *width,
                    height: *height,
                    stride: *stride,
                    format: *format,
                    usage: *usage,
                });
                recorded.buffers.push(id.clone());
                Some(Arc::new(Self(Kind::Buffer)))
            }
            (Kind::Handle, 0, [Argument::Fd(_)]) => {
                recorded.requests.push(Request::AddFd);
                None
            }
            (Kind::Handle, 1, []) => {
                recorded.requests.push(Request::DestroyHandle);
                None
            }
            (Kind::Buffer, 0, []) => {
                recorded.requests.push(Request::DestroyBuffer);
                None
            }
            (kind, opcode, args) => panic!("unexpected request {opcode} on {kind:?}: {args:?}"),
        }
    }

    fn destroyed(self: Arc<Self>, _: &Handle, _: &mut Recorded, _: ClientId, _: ObjectId) {}
}

#[derive(Debug)]
struct Global;

impl GlobalHandler<Recorded> for Global {
    fn bind(
        self: Arc<Self>,
        _: &Handle,
        recorded: &mut Recorded,
        _: ClientId,
        _: GlobalId,
        object_id: ObjectId,
    ) -> Arc<dyn ObjectData<Recorded>> {
        let name = object_id.interface().name;
        recorded.requests.push(Request::Bind(name));
        Arc::new(Object(Kind::Wlegl))
    }
}

#[derive(Debug)]
struct Client;

impl ClientData for Client {}

/// Compositor advertising a decoy global followed by `android_wlegl`.
#[derive(Debug)]
pub(crate) struct TestCompositor {
    backend: Backend<Recorded>,
    recorded: Recorded,
    wlegl: GlobalId,
}

impl TestCompositor {
    /// Starts the compositor and connects a client to it.
    pub(crate) fn new() -> (Self, Connection) {
        let backend = Backend::<Recorded>::new().unwrap();
        let mut handle = backend.handle();
        let global: Arc<dyn GlobalHandler<Recorded>> = Arc::new(Global);
        let decoy = Arc::clone(&global);
        handle.create_global(&WLEGL_V2_INTERFACE, 1, decoy);
        let wlegl = handle.create_global(&ANDROID_WLEGL_INTERFACE, 1, global);

        let (server, client) = UnixStream::pair().unwrap();
        handle.insert_client(server, Arc::new(Client)).unwrap();
        let connection = Connection::from_socket(client).unwrap();
        let compositor = Self {
            backend,
            recorded: Recorded::default(),
            wlegl,
        };
        (compositor, connection)
    }

    /// Exchanges messages until both sides have handled everything sent so
    /// far, dispatching client events into `state`.
    pub(crate) fn sync<S>(&mut self, queue: &mut EventQueue<S>, state: &mut S) {
        for _ in 0..4 {
            queue.flush().unwrap();
            let recorded = &mut self.recorded;
            self.backend.dispatch_all_clients(recorded).unwrap();
            self.backend.flush(None).unwrap();
            if let Some(guard) = queue.prepare_read() {
                // Nothing to read is reported as `WouldBlock`.
                let _ = guard.read();
            }
            queue.dispatch_pending(state).unwrap();
        }
    }

    /// Requests received since the last call.
    pub(crate) fn take_requests(&mut self) -> Vec<Request> {
        core::mem::take(&mut self.recorded.requests)
    }

    /// Server-side id of the `index`th buffer created.
    pub(crate) fn buffer(&self, index: usize) -> &ObjectId {
        &self.recorded.buffers[index]
    }

    /// Sends `wl_buffer.release` for the `index`th buffer created.
    pub(crate) fn release(&self, index: usize) {
        let msg = Message {
            sender_id: self.buffer(index).clone(),
            opcode: 0,
            args: Default::default(),
        };
        self.backend.handle().send_event(msg).unwrap();
    }

    /// Withdraws the `android_wlegl` global.
    pub(crate) fn remove_wlegl(&self) {
        self.backend
            .handle()
            .remove_global::<Recorded>(self.wlegl.clone());
    }
}
