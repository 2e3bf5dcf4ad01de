//! `blob_move_contract` 集成测试：跨 Blob 搬运缓冲。
//!
//! # 测试总览（Why）
//! - `move_buffers` 整体接管且保留目标的工厂绑定；
//! - `move_data_buffers` 只搬数据缓冲，源保留容量缓冲；
//! - `move_and_append_data_buffers` 先裁剪目标尾块再拼接，内容严格连续。

use std::sync::Arc;

use spark_blob::{Blob, Buffer, FixedSizeFactory};

const MAX_SIZE: usize = 3;
const MAX_COUNT: usize = 3;

fn uniform(buffer_size: usize, count: usize, length: usize, seed: u8) -> (Blob, Vec<u8>) {
    let mut blob = Blob::from_buffers((0..count).map(|_| Buffer::zeroed(buffer_size)), None);
    blob.set_length(length).expect("容量之内");
    let content: Vec<u8> = (0..length).map(|i| seed.wrapping_add(i as u8)).collect();
    blob.write_at(0, &content).expect("写入");
    (blob, content)
}

fn grid() -> Vec<(usize, usize, usize)> {
    let mut cases = Vec::new();
    for size in 1..=MAX_SIZE {
        for count in 0..=MAX_COUNT {
            for length in 0..=size * count {
                cases.push((size, count, length));
            }
        }
    }
    cases
}

/// `move_buffers`：目标得到源的全部缓冲与长度，源变空，目标的工厂保留。
#[test]
fn move_buffers_takes_everything_but_the_factory() {
    let mut target = Blob::with_factory(Arc::new(FixedSizeFactory::new(16)));
    target.set_length(5).expect("增长");
    let (mut source, content) = uniform(2, 3, 5, 1);
    let source_buffers = source.buffers().to_vec();

    target.move_buffers(&mut source);
    assert_eq!(target.buffers(), &source_buffers[..]);
    assert_eq!(target.length(), 5);
    assert_eq!(target.copy_to_vec(), content);
    assert!(target.factory().is_some());

    assert_eq!(source.num_buffers(), 0);
    assert_eq!(source.length(), 0);
    assert_eq!(source.total_size(), 0);

    target.set_length(20).expect("目标仍可经工厂增长");
    assert_eq!(target.num_buffers(), 4);
}

/// `move_data_buffers` 网格：目标原有缓冲全部被替换，源留下容量缓冲。
#[test]
fn move_data_buffers_sweep() {
    for (src_size, src_count, src_length) in grid() {
        for (dst_size, dst_count, dst_length) in [(2, 2, 3), (1, 0, 0), (3, 1, 0)] {
            let (mut source, content) = uniform(src_size, src_count, src_length, 7);
            let (mut target, _) = uniform(dst_size, dst_count, dst_length, 90);
            let moved = source.num_data_buffers();
            let data = source.data_buffers().to_vec();

            target.move_data_buffers(&mut source);
            if src_length == 0 {
                assert_eq!(target.num_buffers(), dst_count);
                assert_eq!(target.length(), 0);
            } else {
                assert_eq!(target.buffers(), &data[..]);
                assert_eq!(target.length(), src_length);
                assert_eq!(target.total_size(), moved * src_size);
            }
            assert_eq!(target.copy_to_vec(), content);
            assert_eq!(source.length(), 0);
            assert_eq!(source.num_buffers(), src_count - moved);
            assert_eq!(source.total_size(), (src_count - moved) * src_size);
            target.check_invariants().expect("目标不变式");
            source.check_invariants().expect("源不变式");
        }
    }
}

/// `move_and_append_data_buffers` 网格：长度相加，内容首尾相接，目标的容量缓冲排在最后。
#[test]
fn move_and_append_data_buffers_sweep() {
    for (src_size, src_count, src_length) in grid() {
        for (dst_size, dst_count, dst_length) in grid() {
            let (mut source, src_content) = uniform(src_size, src_count, src_length, 0x30);
            let (mut target, dst_content) = uniform(dst_size, dst_count, dst_length, 0x80);
            let moved = source.num_data_buffers();
            let dst_data = target.num_data_buffers();

            target.move_and_append_data_buffers(&mut source);

            assert_eq!(target.length(), dst_length + src_length);
            assert_eq!(target.num_buffers(), dst_count + moved);
            let mut expected = dst_content;
            expected.extend_from_slice(&src_content);
            assert_eq!(
                target.copy_to_vec(),
                expected,
                "src=({src_size},{src_count},{src_length}) dst=({dst_size},{dst_count},{dst_length})"
            );
            if src_length > 0 {
                assert_eq!(target.num_data_buffers(), dst_data + moved);
            }

            assert_eq!(source.length(), 0);
            assert_eq!(source.num_buffers(), src_count - moved);
            target.check_invariants().expect("目标不变式");
            source.check_invariants().expect("源不变式");
        }
    }
}

/// 源为空时不做任何事，目标尾块的空闲也不会被裁剪。
#[test]
fn move_and_append_from_empty_source_is_a_no_op() {
    let (mut target, _) = uniform(4, 2, 5, 0);
    let (mut source, _) = uniform(4, 1, 0, 0);
    let before = target.clone();

    target.move_and_append_data_buffers(&mut source);
    assert_eq!(target, before);
    assert_eq!(target.total_size(), 8);
    assert_eq!(source.num_buffers(), 1);
}
