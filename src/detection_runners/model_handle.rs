use std::fmt;
use std::sync::Arc;
use anyhow::Result;
use crate::detection_runners::input_wrapper::X;

/// A loaded model: one input tensor in, one raw output tensor out.
///
/// Handles are shared read-only between passes and may be invoked from several
/// threads at once. Runtimes that are not re-entrant serialize internally.
pub trait ModelHandle: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, input: &X) -> Result<X>;
}

pub type SharedModel = Arc<dyn ModelHandle>;

impl fmt::Debug for dyn ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelHandle({})", self.name())
    }
}

/// Wraps a closure as a [`ModelHandle`].
pub struct FnHandle<F> {
    name: String,
    f: F,
}

impl<F> FnHandle<F>
where
    F: Fn(&X) -> Result<X> + Send + Sync,
{
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }

    pub fn shared(name: &str, f: F) -> SharedModel
    where
        F: 'static,
    {
        Arc::new(Self::new(name, f))
    }
}

impl<F> ModelHandle for FnHandle<F>
where
    F: Fn(&X) -> Result<X> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: &X) -> Result<X> {
        (self.f)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_runs_through_handle() {
        let handle = FnHandle::shared("sum", |x: &X| Ok(X::from(vec![x.sum()])));
        assert_eq!(handle.name(), "sum");
        let y = handle.run(&X::from(vec![1., 2., 3.])).unwrap();
        assert_eq!(y.0.as_slice().unwrap(), &[6.]);
    }
}
