// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generated client bindings for `android_wlegl`.

#![allow(
    missing_docs,
    unreachable_pub,
    unused_imports,
    unused_qualifications,
    clippy::all,
    clippy::doc_markdown,
    reason = "generated protocol code"
)]

use wayland_client;
use wayland_client::protocol::*;

pub mod __interfaces {
    use wayland_client::protocol::__interfaces::*;
    wayland_scanner::generate_interfaces!("protocols/android-wlegl.xml");
}

use self::__interfaces::*;

wayland_scanner::generate_client_code!("protocols/android-wlegl.xml");
