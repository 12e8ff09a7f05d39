// THEORY:
// The `Pixel` module is the most fundamental unit of the clustering engine. It is a
// "dumb" value type holding one RGBA color. Pixels are copied, never referenced:
// a swap on the grid moves two values, and a snapshot copies every value out.
//
// Key architectural principles:
// 1.  **Value Semantics**: `Pixel` is `Copy`. Nothing holds on to a pixel's location;
//     only `Grid` knows where a color lives.
// 2.  **Opaque Alpha**: The alpha channel is carried only for image export. Generated
//     colors are fully opaque and alpha never takes part in distance math.
// 3.  **Single Metric**: `color_distance` (sum of absolute channel differences) is the
//     one notion of "closeness" used by the whole engine. It is symmetric,
//     non-negative and zero iff the RGB channels are equal.

pub mod pixel {
    use rand::Rng;

    pub type Byte = u8;
    pub type Channel = Byte;
    pub type ColorDistance = u32;

    pub const CHANNELS: usize = 4;
    pub const OPAQUE: Channel = Channel::MAX;

    /// A single RGBA color value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha channel value (0-255). Fixed at 255 for generated colors.
        pub alpha: Channel,
    }

    impl Default for Pixel {
        fn default() -> Self {
            Pixel::rgb(0, 0, 0)
        }
    }

    impl Pixel {
        pub const fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// An opaque pixel.
        pub const fn rgb(red: Channel, green: Channel, blue: Channel) -> Self {
            Pixel::new(red, green, blue, OPAQUE)
        }

        /// Draws each color channel independently and uniformly from [0, 255].
        pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
            Pixel::rgb(
                rng.gen_range(0..=Channel::MAX),
                rng.gen_range(0..=Channel::MAX),
                rng.gen_range(0..=Channel::MAX),
            )
        }

        /// Sum of absolute differences of the red, green and blue channels.
        pub fn distance(&self, other: &Pixel) -> ColorDistance {
            color_distance(self, other)
        }

        pub fn rgba(&self) -> [Byte; CHANNELS] {
            [self.red, self.green, self.blue, self.alpha]
        }

        pub fn rgb_bytes(&self) -> [Byte; 3] {
            [self.red, self.green, self.blue]
        }
    }

    /// The clustering "closeness" metric: `|r1-r2| + |g1-g2| + |b1-b2|`, in [0, 765].
    pub fn color_distance(a: &Pixel, b: &Pixel) -> ColorDistance {
        a.red.abs_diff(b.red) as ColorDistance
            + a.green.abs_diff(b.green) as ColorDistance
            + a.blue.abs_diff(b.blue) as ColorDistance
    }
}
