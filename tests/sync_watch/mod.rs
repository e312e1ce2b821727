mod etcd_gateway_test;
mod local_sources_test;
