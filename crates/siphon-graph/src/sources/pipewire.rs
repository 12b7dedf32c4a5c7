//! Snapshot source reading the PipeWire registry directly.
//!
//! The registry is enumerated on a short-lived main loop inside a blocking
//! task; every global seen before the settle timer fires lands in the
//! snapshot.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;
use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use pipewire::{context::ContextRc, main_loop::MainLoopRc, registry::GlobalObject, types::ObjectType};

use super::{GraphSource, ReadFailure};
use crate::{ObjectKind, RawObject, Snapshot, SnapshotBuilder};

static PIPEWIRE_INIT: Once = Once::new();

/// How long the registry is given to announce its globals.
const SETTLE: Duration = Duration::from_millis(100);

pub struct NativeSource {
    timeout: Duration,
    builder: SnapshotBuilder,
}

impl NativeSource {
    pub fn new(hub_name: impl Into<String>, timeout: Duration) -> Self {
        PIPEWIRE_INIT.call_once(|| {
            pipewire::init();
        });
        Self {
            timeout,
            builder: SnapshotBuilder::new(hub_name),
        }
    }
}

#[async_trait]
impl GraphSource for NativeSource {
    async fn read(&self) -> Result<Snapshot, ReadFailure> {
        let task = tokio::task::spawn_blocking(collect_globals);
        let objects = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => return Err(ReadFailure::Timeout(self.timeout)),
            Ok(Err(join)) => return Err(ReadFailure::Unavailable(join.to_string())),
            Ok(Ok(Err(e))) => return Err(ReadFailure::Unavailable(format!("{:#}", e))),
            Ok(Ok(Ok(objects))) => objects,
        };
        Ok(self.builder.build(objects))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

fn collect_globals() -> Result<Vec<RawObject>> {
    let objects = Rc::new(RefCell::new(Vec::new()));

    let mainloop = MainLoopRc::new(None).context("Failed to create PipeWire main loop")?;
    let context = ContextRc::new(&mainloop, None).context("Failed to create PipeWire context")?;
    let core = context.connect_rc(None).context("Failed to connect to PipeWire")?;
    let registry = core.get_registry_rc().context("Failed to get PipeWire registry")?;

    let sink = objects.clone();
    let _listener = registry
        .add_listener_local()
        .global(move |global| {
            if let Some(obj) = raw_object(global) {
                sink.borrow_mut().push(obj);
            }
        })
        .register();

    let mainloop_weak = mainloop.downgrade();
    let timer = mainloop.loop_().add_timer(move |_| {
        if let Some(mainloop) = mainloop_weak.upgrade() {
            mainloop.quit();
        }
    });
    timer
        .update_timer(Some(SETTLE), None)
        .into_result()
        .context("Failed to set timer")?;

    mainloop.run();

    let result = objects.borrow().clone();
    Ok(result)
}

fn raw_object<P: AsRef<pipewire::spa::utils::dict::DictRef>>(global: &GlobalObject<P>) -> Option<RawObject> {
    let kind = match global.type_ {
        ObjectType::Node => ObjectKind::Node,
        ObjectType::Port => ObjectKind::Port,
        ObjectType::Link => ObjectKind::Link,
        _ => return None,
    };
    let props = global.props.as_ref()?.as_ref();

    let mut obj = RawObject::new(global.id, kind);
    for (key, value) in props.iter() {
        obj.props.insert(key.to_string(), value.to_string());
    }
    Some(obj)
}
