//! Probe worker - serves a handful of test methods on stdin/stdout.
//!
//! This example demonstrates:
//! - Building a server with the builder pattern
//! - Packed methods with scalar, tuple and struct arguments
//! - Stopping the serve loop from a handler through the context
//!
//! Logs go to stderr (`RUST_LOG=debug` for buffer and dispatch details);
//! stdout carries reply frames only.
//!
//! ```text
//! cargo run --example probe -- --describe   # print the method table as JSON
//! cargo run --example probe                 # serve until `stop` or EOF
//! ```

use std::io;

use rpcwire::connection::StdioConnection;
use rpcwire::{impl_packed, ServerBuilder};
use tracing_subscriber::EnvFilter;

/// Context shared by all probe methods.
struct ProbeCtx {
    working: bool,
}

#[derive(Debug, Clone, Copy)]
struct Point3i {
    x: i32,
    y: i32,
    z: i32,
}

impl_packed!(Point3i { x, y, z });

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let builder = ServerBuilder::new()
        .method("m1", |_: &mut ProbeCtx, a: i32| {
            tracing::info!(a, "m1");
            Ok(())
        })
        .method("m2", |_: &mut ProbeCtx, a: i32| {
            tracing::info!(a, "m2");
            Ok(())
        })
        .method("m3", |_: &mut ProbeCtx, (a, b, c): (i32, i32, i32)| {
            tracing::info!(a, b, c, "m3");
            Ok(())
        })
        .method("stop", |ctx: &mut ProbeCtx, (): ()| {
            ctx.working = false;
            Ok(())
        })
        .method("vadd", |_: &mut ProbeCtx, (a, b): (Point3i, Point3i)| {
            let res = Point3i {
                x: a.x + b.x,
                y: a.y + b.y,
                z: a.z + b.z,
            };
            tracing::info!(?res, "vadd");
            Ok(res)
        });

    if std::env::args().any(|arg| arg == "--describe") {
        println!("{}", builder.registry().build_schema().to_json()?);
        return Ok(());
    }

    let mut server = builder.build(StdioConnection::std(), ProbeCtx { working: true })?;
    server.serve_while(|ctx| ctx.working)?;

    tracing::info!("probe stopped");
    Ok(())
}
