// ============================================
// Thread-Local Context - Контексты для потоков
// ============================================
//
// Каждый воркер планировщика получает свой MeshingContext.

use std::cell::RefCell;

use super::context::MeshingContext;

thread_local! {
    /// Thread-local контекст для генерации мешей
    static MESHING_CONTEXT: RefCell<MeshingContext> = RefCell::new(MeshingContext::new());
}

/// Выполняет функцию с thread-local контекстом
///
/// Не реентерабельно: внутри `f` нельзя снова вызывать `with_meshing_context`.
#[inline]
pub fn with_meshing_context<F, R>(f: F) -> R
where
    F: FnOnce(&mut MeshingContext) -> R,
{
    MESHING_CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        f(&mut ctx)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_reused_within_thread() {
        let before = with_meshing_context(|ctx| {
            ctx.begin();
            ctx.uses
        });
        let after = with_meshing_context(|ctx| {
            ctx.begin();
            ctx.uses
        });
        assert_eq!(after, before + 1);
    }
}
