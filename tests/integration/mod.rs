mod collector;
mod dispatcher;
mod sampler;
