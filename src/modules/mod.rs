pub mod auth;
pub mod books;

use shelf_kernel::ModuleRegistry;

use crate::bootstrap::AppContext;

/// Register all application modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, ctx: &AppContext) {
    registry.register(auth::create_module(ctx));
    registry.register(books::create_module(ctx));
}
