/*

    Geometry change notifications.

    Whoever owns a primitive (scene graph, CSG node) may want
    to know when the primitive's shape or transform changed,
    e.g. to rebuild bounding boxes. The primitive only keeps a
    Weak handle to its observer: ownership always flows from
    parent to child, never back.

    @date: 13 Nov, 2025
    @author: bartu
*/

use std::fmt;
use std::sync::Weak;

use crate::shapes::PrimitiveId;

pub trait GeometryObserver: Send + Sync {
    fn notify_geometry_change(&self, source: PrimitiveId);
}

pub type ObserverHandle = Weak<dyn GeometryObserver>;

/// Outward link from a primitive to its current observer.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    observer: Option<ObserverHandle>,
}

impl ChangeNotifier {

    pub fn set(&mut self, observer: Option<ObserverHandle>) {
        self.observer = observer;
    }

    pub fn detach(&mut self) {
        self.observer = None;
    }

    /// True if an observer is set and still alive
    pub fn is_attached(&self) -> bool {
        self.observer.as_ref().is_some_and(|o| o.strong_count() > 0)
    }

    pub fn notify(&self, source: PrimitiveId) {
        if let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) {
            observer.notify_geometry_change(source);
        }
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("attached", &self.is_attached())
            .finish()
    }
}
