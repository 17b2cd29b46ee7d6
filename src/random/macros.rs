/// Declares a named random stream for the sampling methods of `ContextRandomExt`.
///
/// ```ignore
/// define_rng!(DiseaseRng);
/// let days = context.sample_range(DiseaseRng, 1..10);
/// ```
#[macro_export]
macro_rules! define_rng {
    ($stream:ident) => {
        #[derive(Copy, Clone)]
        struct $stream;

        impl $crate::random::RandomStream for $stream {
            type Generator = $crate::rand::rngs::SmallRng;

            fn stream_name() -> &'static str {
                stringify!($stream)
            }
        }

        // Two streams with one name would draw identical numbers; fail at link time instead.
        $crate::paste::paste! {
            #[doc(hidden)]
            #[no_mangle]
            #[allow(non_upper_case_globals)]
            pub static [<contagion_rng_stream_ $stream>]: () = ();
        }
    };
}
pub use define_rng;
