//! Single-instance builders.
//!
//! A `NodeBuilder` constructs its target on the first call and hands back
//! the same shared instance on every later call. Arguments passed after
//! the first call are ignored: a second call with different parameters
//! does not create a second object and does not update the first one.
//! Call `reset` to release the instance explicitly.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Memoizing constructor holding at most one instance of `T`.
pub struct NodeBuilder<T, A> {
    construct: fn(A) -> T,
    instance: Option<Rc<RefCell<T>>>,
}

impl<T, A> NodeBuilder<T, A> {
    /// Create a builder around a constructor.
    pub fn new(construct: fn(A) -> T) -> Self {
        Self {
            construct,
            instance: None,
        }
    }

    /// Return the instance, constructing it from `args` on the first call only.
    pub fn call(&mut self, args: A) -> Rc<RefCell<T>> {
        if let Some(instance) = &self.instance {
            log::debug!("Reusing existing {} instance", std::any::type_name::<T>());
            return Rc::clone(instance);
        }

        let instance = Rc::new(RefCell::new((self.construct)(args)));
        self.instance = Some(Rc::clone(&instance));
        instance
    }

    /// The memoized instance, if one was built.
    pub fn instance(&self) -> Option<&Rc<RefCell<T>>> {
        self.instance.as_ref()
    }

    pub fn is_built(&self) -> bool {
        self.instance.is_some()
    }

    /// Drop the memoized instance so the next call constructs a fresh one.
    pub fn reset(&mut self) -> Option<Rc<RefCell<T>>> {
        self.instance.take()
    }
}

impl<T, A> fmt::Debug for NodeBuilder<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBuilder")
            .field("target", &std::any::type_name::<T>())
            .field("built", &self.is_built())
            .finish()
    }
}
