pub mod geojson_surface;

pub use geojson_surface::GeoJsonMapSurface;
