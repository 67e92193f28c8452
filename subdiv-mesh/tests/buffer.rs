//! Tests for the buffer module.
use subdiv_mesh::{BufferView, Error};

#[test]
fn test_view_geometry_is_checked() {
    let data = [0.0f32; 6];
    let bytes: &[u8] = bytemuck::cast_slice(&data);

    assert!(matches!(
        BufferView::<[f32; 3]>::new(bytes, 0, 8, 2),
        Err(Error::InvalidBufferView(_))
    ));
    assert!(matches!(
        BufferView::<[f32; 3]>::new(bytes, 4, 12, 2),
        Err(Error::InvalidBufferView(_))
    ));
    assert!(matches!(
        BufferView::<[f32; 3]>::new(bytes, 0, usize::MAX, 2),
        Err(Error::InvalidBufferView(_))
    ));

    // The last element only needs its own size, not a full stride.
    let view = BufferView::<[f32; 3]>::new(bytes, 0, 12, 2).unwrap();
    assert_eq!(view.len(), 2);
    assert!(BufferView::<f32>::new(bytes, 20, 16, 1).is_ok());
    assert!(BufferView::<f32>::new(&[], 0, 4, 0).unwrap().is_empty());
}

#[test]
fn test_interleaved_read() {
    // Position followed by a color, per vertex.
    #[rustfmt::skip]
    let data: [f32; 12] = [
        0.0, 1.0, 2.0, 0.1, 0.2, 0.3,
        3.0, 4.0, 5.0, 0.4, 0.5, 0.6,
    ];
    let bytes: &[u8] = bytemuck::cast_slice(&data);

    let positions = BufferView::<[f32; 3]>::new(bytes, 0, 24, 2).unwrap();
    let colors = BufferView::<[f32; 3]>::new(bytes, 12, 24, 2).unwrap();

    assert_eq!(positions.iter().collect::<Vec<_>>(), [[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]);
    assert_eq!(colors.get(1), Some([0.4, 0.5, 0.6]));
    assert_eq!(colors.get(2), None);
    assert_eq!((colors.stride(), colors.offset()), (24, 12));
}

#[test]
fn test_slot_source_pads_with_zero() {
    let data: [f32; 10] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
    let view = BufferView::<f32>::new(bytemuck::cast_slice(&data), 0, 20, 2).unwrap();
    assert_eq!(view.slot_count(4), 2);

    let second = view.slot_source(1, 4).unwrap();
    assert_eq!(second.len(), 2);
    let mut lanes = [9.0f32; 4];
    second.read(1, &mut lanes).unwrap();
    assert_eq!(lanes, [10.0, 0.0, 0.0, 0.0]);

    let first = view.slot_source(0, 4).unwrap();
    first.read(1, &mut lanes).unwrap();
    assert_eq!(lanes, [6.0, 7.0, 8.0, 9.0]);

    assert!(matches!(
        first.read(2, &mut lanes),
        Err(Error::IndexOutOfBounds { index: 2, max: 1 })
    ));
    assert!(matches!(
        first.read(0, &mut lanes[..2]),
        Err(Error::InvalidBufferSize { expected: 4, actual: 2 })
    ));
}

#[test]
fn test_padded_records_read_as_zero() {
    // A 3 float record padded to 16 bytes where the last record's padding is
    // not part of the memory.
    let data: [f32; 7] = [1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0];
    let view = BufferView::<[f32; 3]>::new(bytemuck::cast_slice(&data), 0, 16, 2).unwrap();

    let source = view.slot_source(0, 4).unwrap();
    assert_eq!(source.lane_count(), 4);
    let mut lanes = [9.0f32; 4];
    source.read(1, &mut lanes).unwrap();
    assert_eq!(lanes, [4.0, 5.0, 6.0, 0.0]);
}
