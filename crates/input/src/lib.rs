mod diff;
mod error;
mod injector;
mod surface;

pub use diff::{plan_edit, EditPlan};
pub use error::{InputError, Result};
pub use injector::{DiffInjector, InjectorOptions};
pub use surface::{EnigoSurface, InjectionSurface};
