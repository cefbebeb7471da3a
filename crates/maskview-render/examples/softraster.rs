//! Renders a small synthetic layout with the software backend and writes
//! the result to `softraster.png`.
//!
//! Run with `RUST_LOG=debug` to see resolver and backend logging.

use std::fs::File;
use std::io::BufWriter;

use maskview_core::element::{Boundary, GridRef, Path, SingleRef, Text};
use maskview_core::{Element, LayerKey, Library, Point, Strans, Structure};
use maskview_render::{
    FrameTarget, LayerColor, LayerStyle, LayoutView, Pixmap, RasterBackend, Viewport,
};

fn demo_library() -> Library {
    let mut lib = Library::new("demo");

    let metal = LayerKey::new(1, 0);
    let poly = LayerKey::new(2, 0);
    let label = LayerKey::new(63, 0);

    lib.add_structure(Structure::with_elements(
        "unit_cell",
        vec![
            Element::Boundary(Boundary::new(
                metal,
                vec![
                    Point::new(0.0, 0.0),
                    Point::new(8.0, 0.0),
                    Point::new(8.0, 8.0),
                    Point::new(0.0, 8.0),
                ],
            )),
            Element::Path(Path::new(
                poly,
                vec![Point::new(1.0, 4.0), Point::new(7.0, 4.0)],
                1.0,
            )),
        ],
    ));

    lib.add_structure(Structure::with_elements(
        "top",
        vec![
            Element::GridRef(GridRef {
                structure: "unit_cell".to_string(),
                origin: Point::new(0.0, 0.0),
                col_corner: Point::new(50.0, 0.0),
                row_corner: Point::new(0.0, 50.0),
                columns: 5,
                rows: 5,
                strans: Strans::default(),
            }),
            Element::SingleRef(
                SingleRef::new("unit_cell", Point::new(60.0, 20.0))
                    .with_strans(Strans::new(false, 45.0, 1.5)),
            ),
            Element::Text(Text::new(label, "DEMO", Point::new(25.0, 55.0))),
        ],
    ));

    lib
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut view = LayoutView::new(Box::new(RasterBackend::new()))?;
    view.set_library(demo_library());
    view.update_scene_graph()?;
    view.set_layer_style(1, 0, LayerStyle::new(LayerColor::new(70, 130, 220), 0.8));
    view.set_layer_style(2, 0, LayerStyle::new(LayerColor::new(220, 80, 60), 0.9));

    let (width, height) = (800u32, 600u32);
    let mut viewport = Viewport::new(width as f64, height as f64);
    viewport.fit_bbox(&view.scene_graph().bounds());

    let mut pixmap = Pixmap::new(width, height);
    let stats = view.render(&viewport, &mut FrameTarget::Pixmap(&mut pixmap))?;
    println!(
        "rendered {} elements ({} culled) in {:.2} ms, {} draw calls",
        stats.elements_rendered, stats.elements_culled, stats.frame_time_ms, stats.draw_calls
    );

    let file = File::create("softraster.png")?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.write_header()?.write_image_data(pixmap.as_bytes())?;
    println!("wrote softraster.png");

    Ok(())
}
