use crate::scheduler::{Finished, Launcher};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Launched(u64),
    Finished(u64),
}

/// In-memory launcher answering by `(seed, config)` taken from the command.
#[derive(Default)]
pub struct ScriptedLauncher {
    fallback: Option<String>,
    responses: HashMap<(u64, String), String>,
    unlaunchable: HashSet<String>,
    events: Mutex<Vec<Event>>,
}

pub struct ScriptedHandle {
    seed: u64,
    stdout: String,
}

impl ScriptedLauncher {
    pub fn uniform(stdout: &str) -> Self {
        Self {
            fallback: Some(stdout.to_string()),
            ..Self::default()
        }
    }

    pub fn respond(mut self, instance: u64, config: &str, stdout: &str) -> Self {
        self.responses
            .insert((instance * 100, config.to_string()), stdout.to_string());
        self
    }

    pub fn unlaunchable(mut self, config: &str) -> Self {
        self.unlaunchable.insert(config.to_string());
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("events lock").clone()
    }
}

fn arg_after<'a>(command: &'a [String], flag: &str) -> &'a str {
    command
        .iter()
        .position(|a| a == flag)
        .and_then(|i| command.get(i + 1))
        .map(String::as_str)
        .expect("flag present in solver command")
}

impl Launcher for ScriptedLauncher {
    type Handle = ScriptedHandle;

    fn launch(&self, command: &[String]) -> io::Result<ScriptedHandle> {
        let seed: u64 = arg_after(command, "--seed").parse().expect("numeric seed");
        let config = arg_after(command, "--config").to_string();
        if self.unlaunchable.contains(&config) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such solver"));
        }
        let stdout = self
            .responses
            .get(&(seed, config))
            .cloned()
            .or_else(|| self.fallback.clone())
            .unwrap_or_default();
        self.events
            .lock()
            .expect("events lock")
            .push(Event::Launched(seed));
        Ok(ScriptedHandle { seed, stdout })
    }

    fn finish(&self, handle: ScriptedHandle) -> io::Result<Finished> {
        self.events
            .lock()
            .expect("events lock")
            .push(Event::Finished(handle.seed));
        Ok(Finished {
            status: Some(0),
            stdout: handle.stdout,
        })
    }
}
