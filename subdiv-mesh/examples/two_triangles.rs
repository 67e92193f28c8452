use subdiv_mesh::{
    cache::{BilinearEvaluator, CacheTable, Derivatives},
    topology::{BoundaryMode, TopologyDescriptor},
    BufferView, SubdivMesh, SubdivMeshOptions,
};

fn main() -> anyhow::Result<()> {
    // Two triangles sharing the edge (1, 2), lifted at one corner.
    let positions: [[f32; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 1.0],
    ];

    let mesh = SubdivMesh::new(
        TopologyDescriptor::new(positions.len(), &[3, 3], &[0, 1, 2, 1, 3, 2]),
        &[BufferView::from_slice(&positions)],
        SubdivMeshOptions {
            boundary_mode: BoundaryMode::EdgeAndCorner,
            ..Default::default()
        },
        BilinearEvaluator::default(),
    )?;

    eprintln!("{:#?}", mesh.report());

    // Sample every triangle on a barycentric grid and output an OBJ point
    // cloud.
    let steps = 8;
    println!("o two_triangles");
    for primitive in 0..mesh.len() {
        for i in 0..=steps {
            for j in 0..=steps - i {
                let (u, v) = (i as f32 / steps as f32, j as f32 / steps as f32);
                let mut p = [0.0f32; 3];
                mesh.interpolate(
                    primitive,
                    u,
                    v,
                    CacheTable::Vertex(0),
                    &mut Derivatives::value(&mut p),
                )?;
                println!("v {} {} {}", p[0], p[1], p[2]);
            }
        }
    }

    let stats = mesh.cache().stats();
    eprintln!(
        "{} patch(es) built, hit rate {:.2}",
        stats.misses,
        stats.hit_rate()
    );

    Ok(())
}
