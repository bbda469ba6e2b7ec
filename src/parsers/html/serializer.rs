use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use markup5ever_rcdom::{Handle, RcDom, SerializableHandle};

/// 将文档序列化为 UTF-8 字节
pub fn serialize_document(dom: &RcDom) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = dom.document.clone().into();
    // 写入 Vec 不会出错
    let _ = serialize(&mut buf, &serializable, SerializeOpts::default());
    buf
}

/// 将单个元素（包括其自身）序列化为标记文本
pub fn serialize_node(node: &Handle) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    let _ = serialize(&mut buf, &serializable, opts);
    String::from_utf8_lossy(&buf).into_owned()
}
