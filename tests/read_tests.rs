mod common;

use common::h4_builder::*;
use hdf4_reader::{
    CancelToken, Chunk, ChunkData, CompressionKind, CompressionSpec, DataLocation, DimRange,
    DType, Error, Section, Segment, Storage,
};

// ---- Contiguous ----

#[test]
fn contiguous_i16_full_read() {
    let mut image = FileImage::new();
    image.place(100, &be_i16(&[1, 2, 3, 4, 5, 6]));
    let desc = scalar_desc(
        DType::I16,
        &[2, 3],
        Storage::Contiguous { start: 100, length: 12 },
    );
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(arr.shape(), &[2, 3]);
    assert_eq!(arr.values::<i16>().unwrap(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn contiguous_subsection() {
    let mut image = FileImage::new();
    image.place(100, &be_i16(&[1, 2, 3, 4, 5, 6]));
    let desc = scalar_desc(
        DType::I16,
        &[2, 3],
        Storage::Contiguous { start: 100, length: 12 },
    );
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader
        .read_data("v", Some(&Section::slice(&[0..2, 1..3])))
        .unwrap()
        .into_array()
        .unwrap();
    assert_eq!(arr.shape(), &[2, 2]);
    assert_eq!(arr.values::<i16>().unwrap(), vec![2, 3, 5, 6]);
}

#[test]
fn contiguous_strided_columns() {
    let mut image = FileImage::new();
    image.place(0, &be_i16(&[1, 2, 3, 4, 5, 6]));
    let desc = scalar_desc(
        DType::I16,
        &[2, 3],
        Storage::Contiguous { start: 0, length: 12 },
    );
    let mut reader = image.reader(single_var("v", desc));

    let section = Section::new(vec![DimRange::all(2), DimRange::new(0, 2, 2)]);
    let arr = reader
        .read_data("v", Some(&section))
        .unwrap()
        .into_array()
        .unwrap();
    assert_eq!(arr.values::<i16>().unwrap(), vec![1, 3, 4, 6]);
}

// ---- Linked segments ----

#[test]
fn segmented_i32_with_zero_length_entry() {
    let mut image = FileImage::new();
    image.place(200, &be_i32(&[7, 8]));
    image.place(400, &be_i32(&[9, 10]));
    let desc = scalar_desc(
        DType::I32,
        &[4],
        Storage::Linked {
            segments: vec![
                Segment::new(200, 8),
                Segment::new(0, 0),
                Segment::new(400, 8),
            ],
        },
    );
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(arr.values::<i32>().unwrap(), vec![7, 8, 9, 10]);
}

#[test]
fn zero_length_segments_do_not_change_the_result() {
    let data = be_i32(&[7, 8, 9, 10]);
    let with_zero = vec![
        Segment::new(200, 8),
        Segment::new(0, 0),
        Segment::new(400, 8),
    ];
    let without_zero = vec![Segment::new(200, 8), Segment::new(400, 8)];

    let mut results = Vec::new();
    for segments in [with_zero, without_zero] {
        let mut image = FileImage::new();
        image.place(200, &data[..8]);
        image.place(400, &data[8..]);
        let desc = scalar_desc(DType::I32, &[4], Storage::Linked { segments });
        let mut reader = image.reader(single_var("v", desc));
        results.push(
            reader
                .read_data("v", None)
                .unwrap()
                .into_array()
                .unwrap(),
        );
    }
    assert_eq!(results[0], results[1]);
}

#[test]
fn segmented_subsection_splits_at_boundaries() {
    // segment boundary falls inside element 2 of a 3-byte-offset read
    let mut image = FileImage::new();
    let bytes = be_u16(&[10, 20, 30, 40, 50]);
    image.place(50, &bytes[..3]);
    image.place(80, &bytes[3..]);
    let desc = scalar_desc(
        DType::U16,
        &[5],
        Storage::Linked {
            segments: vec![Segment::new(50, 3), Segment::new(80, 7)],
        },
    );
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader
        .read_data("v", Some(&Section::slice(&[1..4])))
        .unwrap()
        .into_array()
        .unwrap();
    assert_eq!(arr.values::<u16>().unwrap(), vec![20, 30, 40]);
}

// ---- DEFLATE ----

#[test]
fn deflate_contiguous_f32() {
    let plain = be_f32(&[1.0, 2.0, 3.0, 4.0]);
    let packed = deflate(&plain);
    let mut image = FileImage::new();
    let start = image.place(64, &packed);
    let mut desc = scalar_desc(
        DType::F32,
        &[4],
        Storage::Contiguous { start, length: packed.len() as u64 },
    );
    desc.compression = Some(CompressionSpec {
        kind: CompressionKind::Deflate,
        uncompressed_length: plain.len() as u64,
    });
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(arr.values::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn deflate_truncated_stream_errors() {
    let plain = be_f32(&[1.0, 2.0, 3.0, 4.0]);
    let packed = deflate(&plain);
    let cut = packed.len() / 2;
    let mut image = FileImage::new();
    let start = image.place(0, &packed[..cut]);
    let mut desc = scalar_desc(
        DType::F32,
        &[4],
        Storage::Contiguous { start, length: cut as u64 },
    );
    desc.compression = Some(CompressionSpec {
        kind: CompressionKind::Deflate,
        uncompressed_length: plain.len() as u64,
    });
    let mut reader = image.reader(single_var("v", desc));

    assert!(matches!(
        reader.read_data("v", None),
        Err(Error::Truncated { .. })
    ));
}

#[test]
fn deflate_linked_segments() {
    let plain = be_f64(&[0.5, -1.5, 2.25, 8.0, 13.5, -0.125]);
    let packed = deflate(&plain);
    let split = packed.len() / 3;
    let mut image = FileImage::new();
    let first = image.place(32, &packed[..split]);
    let second = image.place(512, &packed[split..]);
    let mut desc = scalar_desc(
        DType::F64,
        &[6],
        Storage::Linked {
            segments: vec![
                Segment::new(first, split as u64),
                Segment::new(0, 0),
                Segment::new(second, (packed.len() - split) as u64),
            ],
        },
    );
    desc.compression = Some(CompressionSpec {
        kind: CompressionKind::Deflate,
        uncompressed_length: plain.len() as u64,
    });
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(
        arr.values::<f64>().unwrap(),
        vec![0.5, -1.5, 2.25, 8.0, 13.5, -0.125]
    );
}

#[test]
fn deflate_subsection_skips_stream_prefix() {
    let values: Vec<i32> = (0..24).collect();
    let plain = be_i32(&values);
    let packed = deflate(&plain);
    let mut image = FileImage::new();
    let start = image.place(0, &packed);
    let mut desc = scalar_desc(
        DType::I32,
        &[4, 6],
        Storage::Contiguous { start, length: packed.len() as u64 },
    );
    desc.compression = Some(CompressionSpec {
        kind: CompressionKind::Deflate,
        uncompressed_length: plain.len() as u64,
    });
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader
        .read_data("v", Some(&Section::slice(&[2..4, 1..3])))
        .unwrap()
        .into_array()
        .unwrap();
    assert_eq!(arr.values::<i32>().unwrap(), vec![13, 14, 19, 20]);
}

#[test]
fn unknown_compression_code_is_unsupported() {
    let mut image = FileImage::new();
    image.place(0, &[0u8; 16]);
    let mut desc = scalar_desc(
        DType::U8,
        &[16],
        Storage::Contiguous { start: 0, length: 16 },
    );
    desc.compression = Some(CompressionSpec {
        kind: CompressionKind::from_code(5),
        uncompressed_length: 16,
    });
    let mut reader = image.reader(single_var("v", desc));

    assert!(matches!(
        reader.read_data("v", None),
        Err(Error::Unsupported(_))
    ));
}

// ---- Chunked ----

fn chunked_u8_with_missing_tiles() -> (FileImage, hdf4_reader::StorageDescriptor) {
    let mut image = FileImage::new();
    let c0 = image.append(&[1, 2, 3, 4]);
    let c1 = image.append(&[5, 6, 7, 8]);
    let mut desc = scalar_desc(
        DType::U8,
        &[4, 4],
        Storage::Chunked {
            chunk_shape: vec![2, 2],
            chunks: vec![
                Chunk {
                    origin: vec![0, 0],
                    data: ChunkData::Raw { offset: c0, length: 4 },
                },
                Chunk {
                    origin: vec![2, 2],
                    data: ChunkData::Raw { offset: c1, length: 4 },
                },
            ],
        },
    );
    desc.fill_value = Some(vec![0xFF]);
    (image, desc)
}

#[test]
fn chunked_u8_missing_chunks_read_as_fill() {
    let (image, desc) = chunked_u8_with_missing_tiles();
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(
        arr.values::<u8>().unwrap(),
        vec![
            1, 2, 0xFF, 0xFF, //
            3, 4, 0xFF, 0xFF, //
            0xFF, 0xFF, 5, 6, //
            0xFF, 0xFF, 7, 8,
        ]
    );
}

#[test]
fn chunked_section_inside_a_missing_chunk_is_all_fill() {
    let (image, desc) = chunked_u8_with_missing_tiles();
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader
        .read_data("v", Some(&Section::slice(&[0..2, 2..4])))
        .unwrap()
        .into_array()
        .unwrap();
    assert_eq!(arr.values::<u8>().unwrap(), vec![0xFF; 4]);
}

#[test]
fn chunked_strided_section() {
    let (image, desc) = chunked_u8_with_missing_tiles();
    let mut reader = image.reader(single_var("v", desc));

    // rows 0 and 2, every other column
    let section = Section::new(vec![DimRange::new(0, 2, 2), DimRange::new(0, 2, 2)]);
    let arr = reader
        .read_data("v", Some(&section))
        .unwrap()
        .into_array()
        .unwrap();
    assert_eq!(arr.values::<u8>().unwrap(), vec![1, 0xFF, 0xFF, 5]);
}

#[test]
fn chunked_compressed_with_linked_chunk_payload() {
    let mut image = FileImage::new();
    let plain0 = be_u16(&[1, 2, 3, 4]);
    let plain1 = be_u16(&[5, 6, 7, 8]);
    let packed0 = deflate(&plain0);
    let packed1 = deflate(&plain1);

    let off0 = image.append(&packed0);
    // second chunk's payload split across two linked segments
    let split = packed1.len() / 2;
    let seg_a = image.place(300, &packed1[..split]);
    let seg_b = image.place(400, &packed1[split..]);

    let desc = scalar_desc(
        DType::U16,
        &[4, 4],
        Storage::Chunked {
            chunk_shape: vec![2, 2],
            chunks: vec![
                Chunk {
                    origin: vec![0, 0],
                    data: ChunkData::Compressed {
                        spec: CompressionSpec {
                            kind: CompressionKind::Deflate,
                            uncompressed_length: 8,
                        },
                        data: DataLocation::Contiguous {
                            offset: off0,
                            length: packed0.len() as u64,
                        },
                    },
                },
                Chunk {
                    origin: vec![2, 2],
                    data: ChunkData::Compressed {
                        spec: CompressionSpec {
                            kind: CompressionKind::Deflate,
                            uncompressed_length: 8,
                        },
                        data: DataLocation::Linked {
                            segments: vec![
                                Segment::new(seg_a, split as u64),
                                Segment::new(seg_b, (packed1.len() - split) as u64),
                            ],
                        },
                    },
                },
            ],
        },
    );
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(
        arr.values::<u16>().unwrap(),
        vec![
            1, 2, 0, 0, //
            3, 4, 0, 0, //
            0, 0, 5, 6, //
            0, 0, 7, 8,
        ]
    );
}

#[test]
fn chunked_none_compression_chunk_passes_through() {
    let mut image = FileImage::new();
    let off = image.append(&[9, 8, 7, 6]);
    let desc = scalar_desc(
        DType::U8,
        &[2, 2],
        Storage::Chunked {
            chunk_shape: vec![2, 2],
            chunks: vec![Chunk {
                origin: vec![0, 0],
                data: ChunkData::Compressed {
                    spec: CompressionSpec {
                        kind: CompressionKind::None,
                        uncompressed_length: 4,
                    },
                    data: DataLocation::Contiguous { offset: off, length: 4 },
                },
            }],
        },
    );
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(arr.values::<u8>().unwrap(), vec![9, 8, 7, 6]);
}

// ---- Fill-only variables ----

#[test]
fn has_no_data_synthesizes_fill() {
    let mut desc = scalar_desc(
        DType::U8,
        &[5],
        Storage::Contiguous { start: 0, length: 0 },
    );
    desc.has_no_data = true;
    desc.fill_value = Some(vec![0x2A]);
    let mut reader = FileImage::new().reader(single_var("v", desc));

    let arr = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(arr.values::<u8>().unwrap(), vec![42; 5]);
}

#[test]
fn has_no_data_without_fill_is_zero() {
    let mut desc = scalar_desc(
        DType::I32,
        &[3],
        Storage::Contiguous { start: 0, length: 0 },
    );
    desc.has_no_data = true;
    let mut reader = FileImage::new().reader(single_var("v", desc));

    let arr = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(arr.values::<i32>().unwrap(), vec![0; 3]);
}

// ---- Properties ----

/// Extracts a (start, len, stride)-per-dim slice from full row-major data.
fn manual_slice(full: &[u8], shape: &[u64], ranges: &[(u64, u64, u64)]) -> Vec<u8> {
    let mut out = Vec::new();
    let strides: Vec<u64> = {
        let mut s = vec![1u64; shape.len()];
        for d in (0..shape.len() - 1).rev() {
            s[d] = s[d + 1] * shape[d + 1];
        }
        s
    };
    let mut idx = vec![0u64; ranges.len()];
    loop {
        let src: u64 = idx
            .iter()
            .zip(ranges)
            .zip(&strides)
            .map(|((&i, &(start, _, stride)), &s)| (start + i * stride) * s)
            .sum();
        out.push(full[src as usize]);
        let mut d = ranges.len();
        loop {
            if d == 0 {
                return out;
            }
            d -= 1;
            idx[d] += 1;
            if idx[d] < ranges[d].1 {
                break;
            }
            idx[d] = 0;
        }
    }
}

#[test]
fn section_read_equals_slice_of_full_read() {
    let shape = [4u64, 4, 3];
    let full: Vec<u8> = (0..48).collect();
    let mut image = FileImage::new();
    image.place(16, &full);
    let desc = scalar_desc(
        DType::U8,
        &shape,
        Storage::Contiguous { start: 16, length: 48 },
    );
    let mut reader = image.reader(single_var("v", desc));

    let full_read = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(full_read.as_bytes(), &full[..]);

    let cases: &[&[(u64, u64, u64)]] = &[
        &[(1, 2, 1), (0, 4, 1), (0, 3, 1)],
        &[(0, 2, 2), (1, 2, 2), (0, 2, 2)],
        &[(3, 1, 1), (0, 2, 3), (1, 2, 1)],
    ];
    for ranges in cases {
        let section = Section::new(
            ranges
                .iter()
                .map(|&(start, len, stride)| DimRange::new(start, len, stride))
                .collect(),
        );
        let arr = reader
            .read_data("v", Some(&section))
            .unwrap()
            .into_array()
            .unwrap();
        assert_eq!(arr.as_bytes(), manual_slice(&full, &shape, ranges), "{:?}", ranges);
    }
}

#[test]
fn repeated_reads_are_bit_identical() {
    let (image, desc) = chunked_u8_with_missing_tiles();
    let mut reader = image.reader(single_var("v", desc));

    let first = reader.read_data("v", None).unwrap().into_array().unwrap();
    let second = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(first, second);
}

#[test]
fn multi_byte_values_are_host_endian() {
    let mut image = FileImage::new();
    image.place(0, &[0x01, 0x02, 0xFF, 0xFE]);
    let desc = scalar_desc(
        DType::U16,
        &[2],
        Storage::Contiguous { start: 0, length: 4 },
    );
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(arr.values::<u16>().unwrap(), vec![0x0102, 0xFFFE]);
}

#[test]
fn compression_equivalence() {
    let plain = be_i16(&[-3, 0, 7, 1000, -1000, 42]);

    let mut raw_image = FileImage::new();
    raw_image.place(8, &plain);
    let raw_desc = scalar_desc(
        DType::I16,
        &[6],
        Storage::Contiguous { start: 8, length: plain.len() as u64 },
    );
    let mut raw_reader = raw_image.reader(single_var("v", raw_desc));

    let packed = deflate(&plain);
    let mut packed_image = FileImage::new();
    packed_image.place(8, &packed);
    let mut packed_desc = scalar_desc(
        DType::I16,
        &[6],
        Storage::Contiguous { start: 8, length: packed.len() as u64 },
    );
    packed_desc.compression = Some(CompressionSpec {
        kind: CompressionKind::Deflate,
        uncompressed_length: plain.len() as u64,
    });
    let mut packed_reader = packed_image.reader(single_var("v", packed_desc));

    assert_eq!(
        raw_reader.read_data("v", None).unwrap(),
        packed_reader.read_data("v", None).unwrap()
    );
}

// ---- Char surface ----

#[test]
fn char_variable_surfaces_characters() {
    let mut image = FileImage::new();
    image.place(0, b"HDF4");
    let desc = scalar_desc(
        DType::Char,
        &[4],
        Storage::Contiguous { start: 0, length: 4 },
    );
    let mut reader = image.reader(single_var("v", desc));

    let arr = reader.read_data("v", None).unwrap().into_array().unwrap();
    assert_eq!(arr.chars().unwrap(), vec!['H', 'D', 'F', '4']);
    assert!(arr.values::<i32>().is_err());
}

// ---- Errors & cancellation ----

#[test]
fn out_of_bounds_section_is_invalid() {
    let mut image = FileImage::new();
    image.place(0, &[0u8; 6]);
    let desc = scalar_desc(
        DType::U8,
        &[2, 3],
        Storage::Contiguous { start: 0, length: 6 },
    );
    let mut reader = image.reader(single_var("v", desc));

    assert!(matches!(
        reader.read_data("v", Some(&Section::slice(&[0..3, 0..3]))),
        Err(Error::InvalidSection { .. })
    ));
    assert!(matches!(
        reader.read_data("v", Some(&Section::new(vec![DimRange::new(0, 2, 0)]))),
        Err(Error::InvalidSection { .. })
    ));
}

#[test]
fn unknown_variable_is_reported() {
    let mut reader = FileImage::new().reader(hdf4_reader::Directory::new());
    assert!(matches!(
        reader.read_data("nope", None),
        Err(Error::VariableNotFound(_))
    ));
}

#[test]
fn cancelled_token_aborts_the_read() {
    let mut image = FileImage::new();
    image.place(0, &be_i16(&[1, 2, 3, 4]));
    let desc = scalar_desc(
        DType::I16,
        &[4],
        Storage::Contiguous { start: 0, length: 8 },
    );
    let mut reader = image.reader(single_var("v", desc));

    let token = CancelToken::new();
    token.cancel();
    assert!(matches!(
        reader.read_data_cancellable("v", None, Some(&token)),
        Err(Error::Cancelled)
    ));
}
