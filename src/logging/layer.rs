//! `tracing` integration for the category registry.
//!
//! # Responsibilities
//! - Decide per event whether its category is enabled (nearest configured logger wins)
//! - Route encoded records to the current `AppenderSet` with logback-style additivity
//!
//! Both read the live `LoggerTree` through `ArcSwap::load`, so emitting an
//! event never waits on the registry's writer lock.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::Interest;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Filter};

use crate::logging::appender::AppenderSet;

/// A configured logger: level and additivity. Every logger in the tree has the
/// current appenders attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerNode {
    pub level: LevelFilter,
    pub additive: bool,
}

/// Immutable view of the logger hierarchy for one point in time.
#[derive(Debug, Clone)]
pub struct LoggerTree {
    root_level: LevelFilter,
    loggers: HashMap<String, LoggerNode>,
    appenders: Option<Arc<AppenderSet>>,
}

impl LoggerTree {
    /// Tree with no outputs; nothing is emitted until the registry initialises.
    pub fn detached() -> Self {
        Self {
            root_level: LevelFilter::OFF,
            loggers: HashMap::new(),
            appenders: None,
        }
    }

    pub fn new(root_level: LevelFilter, appenders: Arc<AppenderSet>) -> Self {
        Self {
            root_level,
            loggers: HashMap::new(),
            appenders: Some(appenders),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, node: LoggerNode) {
        self.loggers.insert(name.into(), node);
    }

    pub fn remove(&mut self, name: &str) -> Option<LoggerNode> {
        self.loggers.remove(name)
    }

    pub fn logger(&self, name: &str) -> Option<&LoggerNode> {
        self.loggers.get(name)
    }

    pub fn root_level(&self) -> LevelFilter {
        self.root_level
    }

    pub fn appenders(&self) -> Option<&Arc<AppenderSet>> {
        self.appenders.as_ref()
    }

    /// Level of the nearest configured logger on the path to root.
    pub fn effective_level(&self, target: &str) -> LevelFilter {
        lineage(target)
            .find_map(|name| self.loggers.get(name).map(|node| node.level))
            .unwrap_or(self.root_level)
    }

    /// How many attached loggers write an event for `target`.
    ///
    /// Walks from the category towards root, counting each configured logger,
    /// and stops after the first non-additive one. Root counts when reached.
    pub fn route_count(&self, target: &str) -> usize {
        let mut count = 0;
        for name in lineage(target) {
            if let Some(node) = self.loggers.get(name) {
                count += 1;
                if !node.additive {
                    return count;
                }
            }
        }
        count + 1
    }

    pub fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.appenders.is_some() && *metadata.level() <= self.effective_level(metadata.target())
    }
}

/// `a::b::c` → `a::b::c`, `a::b`, `a`. Dots separate segments as well.
fn lineage(target: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(target), |&name| parent(name)).filter(|name| !name.is_empty())
}

fn parent(name: &str) -> Option<&str> {
    let colons = name.rfind("::");
    let dot = name.rfind('.');
    colons.max(dot).map(|idx| &name[..idx])
}

/// Per-layer filter backed by the live logger tree.
#[derive(Clone)]
pub struct CategoryFilter {
    tree: Arc<ArcSwap<LoggerTree>>,
}

impl CategoryFilter {
    pub fn new(tree: Arc<ArcSwap<LoggerTree>>) -> Self {
        Self { tree }
    }
}

impl<S> Filter<S> for CategoryFilter {
    fn enabled(&self, metadata: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        self.tree.load().enabled(metadata)
    }

    // Levels change at runtime, so no callsite may be cached as never/always.
    fn callsite_enabled(&self, _metadata: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Console,
    File,
}

/// `MakeWriter` that resolves the appenders and fan-out for each event.
#[derive(Clone)]
pub struct CategoryWriter {
    tree: Arc<ArcSwap<LoggerTree>>,
    sink: Sink,
}

impl CategoryWriter {
    pub fn console(tree: Arc<ArcSwap<LoggerTree>>) -> Self {
        Self {
            tree,
            sink: Sink::Console,
        }
    }

    pub fn file(tree: Arc<ArcSwap<LoggerTree>>) -> Self {
        Self {
            tree,
            sink: Sink::File,
        }
    }

    fn writer(&self, target: Option<&str>, level: Level) -> RoutedWriter {
        let tree = self.tree.load();
        RoutedWriter {
            appenders: tree.appenders().cloned(),
            sink: self.sink,
            copies: target.map_or(1, |target| tree.route_count(target)),
            level,
        }
    }
}

impl<'a> MakeWriter<'a> for CategoryWriter {
    type Writer = RoutedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer(None, Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        self.writer(Some(meta.target()), *meta.level())
    }
}

/// Writer for one event, bound to the appender generation current when the
/// event was emitted.
pub struct RoutedWriter {
    appenders: Option<Arc<AppenderSet>>,
    sink: Sink,
    copies: usize,
    level: Level,
}

impl io::Write for RoutedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(appenders) = &self.appenders {
            for _ in 0..self.copies {
                match self.sink {
                    Sink::Console => appenders.write_console(buf)?,
                    Sink::File => appenders.write_file(self.level, buf)?,
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
